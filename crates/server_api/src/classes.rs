use serde::Deserialize;
use shared::{
    domain::{is_valid_usn, ClassId, Role, UserId},
    error::ApiError,
    protocol::{ClassSummary, MessageResponse},
};
use tracing::info;

use crate::{forbidden, internal, not_found, present, validation, ApiContext, Caller};

#[derive(Debug, Default, Deserialize)]
pub struct CreateClassRequest {
    pub name: Option<String>,
    pub semester: Option<String>,
    #[serde(default)]
    pub students: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    pub semester: Option<String>,
    pub students: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddStudentRequest {
    #[serde(alias = "studentId")]
    pub student_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReassignTeacherRequest {
    #[serde(alias = "teacherId")]
    pub teacher_id: Option<i64>,
}

pub async fn create_class(
    ctx: &ApiContext,
    caller: Caller,
    req: CreateClassRequest,
) -> Result<ClassSummary, ApiError> {
    caller.require_staff_or_teacher()?;
    let (Some(name), Some(semester)) = (
        present(req.name.as_deref()),
        present(req.semester.as_deref()),
    ) else {
        return Err(validation("Name and semester are required"));
    };
    let students = normalize_roster(&req.students)?;

    let class_id = ctx
        .storage
        .create_class(name, semester, &students, caller.user_id)
        .await
        .map_err(internal)?;
    info!(class_id = class_id.0, teacher = caller.user_id.0, "class created");
    load(ctx, class_id).await
}

pub async fn list_classes(ctx: &ApiContext) -> Result<Vec<ClassSummary>, ApiError> {
    ctx.storage.list_classes().await.map_err(internal)
}

pub async fn get_class(ctx: &ApiContext, class_id: ClassId) -> Result<ClassSummary, ApiError> {
    load(ctx, class_id).await
}

pub async fn update_class(
    ctx: &ApiContext,
    caller: Caller,
    class_id: ClassId,
    req: UpdateClassRequest,
) -> Result<ClassSummary, ApiError> {
    owned_by_caller(ctx, caller, class_id, "Not authorized to update this class").await?;
    let students = req.students.as_deref().map(normalize_roster).transpose()?;

    ctx.storage
        .update_class(
            class_id,
            present(req.name.as_deref()),
            present(req.semester.as_deref()),
            students.as_deref(),
        )
        .await
        .map_err(internal)?;
    load(ctx, class_id).await
}

pub async fn delete_class(
    ctx: &ApiContext,
    caller: Caller,
    class_id: ClassId,
) -> Result<MessageResponse, ApiError> {
    owned_by_caller(ctx, caller, class_id, "Not authorized to delete this class").await?;
    ctx.storage.delete_class(class_id).await.map_err(internal)?;
    info!(class_id = class_id.0, "class deleted");
    Ok(MessageResponse::new("Class deleted successfully"))
}

pub async fn add_student(
    ctx: &ApiContext,
    caller: Caller,
    class_id: ClassId,
    req: AddStudentRequest,
) -> Result<ClassSummary, ApiError> {
    owned_by_caller(ctx, caller, class_id, "Not authorized to modify this class").await?;
    let Some(student) = present(req.student_id.as_deref()) else {
        return Err(validation("Student ID is required"));
    };
    let student = normalize_usn(student)?;

    let added = ctx
        .storage
        .add_class_student(class_id, &student)
        .await
        .map_err(internal)?;
    if !added {
        return Err(validation("Student is already in this class"));
    }
    load(ctx, class_id).await
}

pub async fn remove_student(
    ctx: &ApiContext,
    caller: Caller,
    class_id: ClassId,
    student_id: &str,
) -> Result<ClassSummary, ApiError> {
    owned_by_caller(ctx, caller, class_id, "Not authorized to modify this class").await?;
    let removed = ctx
        .storage
        .remove_class_student(class_id, &student_id.trim().to_ascii_uppercase())
        .await
        .map_err(internal)?;
    if !removed {
        return Err(not_found("Student not found in this class"));
    }
    load(ctx, class_id).await
}

/// Hands a class to another teacher. Reserved for lab staff.
pub async fn reassign_teacher(
    ctx: &ApiContext,
    caller: Caller,
    class_id: ClassId,
    req: ReassignTeacherRequest,
) -> Result<ClassSummary, ApiError> {
    caller.require_role(&[Role::Admin, Role::LabInstructor])?;
    let Some(teacher_id) = req.teacher_id.map(UserId) else {
        return Err(validation("Teacher ID is required"));
    };
    ctx.storage
        .class_teacher(class_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Class not found"))?;

    let teacher = ctx
        .storage
        .user_by_id(teacher_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Teacher not found"))?;
    if teacher.role != Role::Teacher {
        return Err(validation("User is not a teacher"));
    }

    ctx.storage
        .set_class_teacher(class_id, teacher_id)
        .await
        .map_err(internal)?;
    info!(class_id = class_id.0, teacher = teacher_id.0, "class teacher reassigned");
    load(ctx, class_id).await
}

async fn load(ctx: &ApiContext, class_id: ClassId) -> Result<ClassSummary, ApiError> {
    ctx.storage
        .load_class(class_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Class not found"))
}

/// Fails unless `caller` teaches the class.
pub(crate) async fn owned_by_caller(
    ctx: &ApiContext,
    caller: Caller,
    class_id: ClassId,
    denied: &str,
) -> Result<(), ApiError> {
    let teacher = ctx
        .storage
        .class_teacher(class_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Class not found"))?;
    if teacher != caller.user_id {
        return Err(forbidden(denied));
    }
    Ok(())
}

pub(crate) fn normalize_usn(raw: &str) -> Result<String, ApiError> {
    let usn = raw.trim().to_ascii_uppercase();
    if !is_valid_usn(&usn) {
        return Err(validation(format!("Invalid USN: {raw}")));
    }
    Ok(usn)
}

fn normalize_roster(students: &[String]) -> Result<Vec<String>, ApiError> {
    let mut roster: Vec<String> = Vec::with_capacity(students.len());
    for raw in students {
        let usn = normalize_usn(raw)?;
        if !roster.contains(&usn) {
            roster.push(usn);
        }
    }
    Ok(roster)
}

#[cfg(test)]
#[path = "tests/classes_tests.rs"]
mod tests;
