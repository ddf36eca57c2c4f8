//! Subscriber-side view of a live presentation session.
//!
//! Every event overwrites the fields it carries; nothing is merged or ordered.
//! The countdown is purely local and is corrected only by the next
//! `timer-update` that arrives.

use serde::Serialize;
use serde_json::Value;

use crate::presentation::PresentationEvent;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresentationView {
    pub current_team: Option<Value>,
    pub timer_secs: i64,
    pub running: bool,
    pub queue: Vec<Value>,
    pub evaluation_enabled: bool,
    pub evaluation_remaining_secs: Option<i64>,
    pub form: Option<Value>,
    pub submissions_seen: u64,
}

impl PresentationView {
    /// Applies one relayed message. Returns `false` for events this view does
    /// not track.
    pub fn apply(&mut self, event: &str, data: &Value) -> bool {
        let Some(event) = PresentationEvent::parse(event) else {
            return false;
        };

        match event {
            PresentationEvent::PresentationStart => {
                self.current_team = non_null(data.get("team"));
                self.timer_secs = seconds(data.get("timer")).unwrap_or(0);
                self.running = true;
                self.evaluation_enabled = false;
                self.evaluation_remaining_secs = None;
            }
            PresentationEvent::PresentationEnd => {
                if let Some(team) = non_null(data.get("team")) {
                    self.current_team = Some(team);
                }
                self.running = false;
                self.timer_secs = 0;
            }
            PresentationEvent::TimerUpdate => {
                if let Some(timer) = seconds(data.get("timer")) {
                    self.timer_secs = timer;
                }
                if let Some(team) = non_null(data.get("team")) {
                    self.current_team = Some(team);
                }
            }
            PresentationEvent::CurrentTeamUpdate => {
                self.current_team = non_null(data.get("team"));
            }
            PresentationEvent::QueueUpdate => {
                self.queue = match data.get("teams") {
                    Some(Value::Array(teams)) => teams.clone(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other.clone()],
                };
            }
            PresentationEvent::EvaluationToggle => {
                self.evaluation_enabled = data.get("enabled").is_some_and(truthy);
                self.evaluation_remaining_secs = if self.evaluation_enabled {
                    seconds(data.get("timeLimit")).filter(|secs| *secs > 0)
                } else {
                    None
                };
            }
            PresentationEvent::EvaluationFormUpdate => {
                self.form = Some(data.clone());
            }
            PresentationEvent::EvaluationSubmitted => {
                self.submissions_seen += 1;
            }
        }
        true
    }

    /// Advances local clocks by one second.
    pub fn tick(&mut self) {
        if self.running {
            self.timer_secs = self.timer_secs.saturating_add(1);
        }
        if let Some(remaining) = self.evaluation_remaining_secs {
            let remaining = remaining - 1;
            if remaining <= 0 {
                self.evaluation_enabled = false;
                self.evaluation_remaining_secs = None;
            } else {
                self.evaluation_remaining_secs = Some(remaining);
            }
        }
    }
}

/// `MM:SS`, minutes unbounded.
pub fn format_clock(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Loose truthiness as the browser client evaluates payload flags.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

/// Whole seconds, clamped to `0..=i64::MAX`.
fn seconds(value: Option<&Value>) -> Option<i64> {
    value
        .and_then(Value::as_f64)
        .map(|f| f.round().clamp(0.0, i64::MAX as f64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_timer_update_wins() {
        let mut view = PresentationView::default();
        view.apply("presentation-start", &json!({ "team": "Alpha", "timer": 0 }));
        view.tick();
        view.tick();
        assert_eq!(view.timer_secs, 2);

        view.apply("timer-update", &json!({ "timer": 90, "team": "Beta" }));
        assert_eq!(view.timer_secs, 90);
        assert_eq!(view.current_team, Some(json!("Beta")));

        view.apply("timer-update", &json!({ "timer": 30 }));
        assert_eq!(view.timer_secs, 30);
        assert_eq!(view.current_team, Some(json!("Beta")));
    }

    #[test]
    fn evaluation_window_closes_when_countdown_expires() {
        let mut view = PresentationView::default();
        view.apply("evaluation-toggle", &json!({ "enabled": true, "timeLimit": 2 }));
        assert!(view.evaluation_enabled);
        view.tick();
        assert_eq!(view.evaluation_remaining_secs, Some(1));
        view.tick();
        assert!(!view.evaluation_enabled);
        assert_eq!(view.evaluation_remaining_secs, None);
    }

    #[test]
    fn toggle_without_limit_stays_open_until_disabled() {
        let mut view = PresentationView::default();
        view.apply("evaluation-toggle", &json!({ "enabled": true }));
        for _ in 0..10 {
            view.tick();
        }
        assert!(view.evaluation_enabled);
        view.apply("evaluation-toggle", &json!({ "enabled": false }));
        assert!(!view.evaluation_enabled);
    }

    #[test]
    fn end_stops_clock_and_keeps_team() {
        let mut view = PresentationView::default();
        view.apply("presentation-start", &json!({ "team": { "name": "Gamma" }, "timer": 0 }));
        view.tick();
        view.apply("presentation-end", &json!({ "team": null }));
        assert!(!view.running);
        assert_eq!(view.timer_secs, 0);
        assert_eq!(view.current_team, Some(json!({ "name": "Gamma" })));
        view.tick();
        assert_eq!(view.timer_secs, 0);
    }

    #[test]
    fn queue_and_form_are_replaced_wholesale() {
        let mut view = PresentationView::default();
        view.apply("queue-update", &json!({ "teams": ["A", "B"] }));
        view.apply("queue-update", &json!({ "teams": ["C"] }));
        assert_eq!(view.queue, vec![json!("C")]);

        view.apply("evaluation-form-update", &json!({ "title": "Round 1" }));
        assert_eq!(view.form, Some(json!({ "title": "Round 1" })));
    }

    #[test]
    fn oversized_or_fractional_timers_do_not_overflow() {
        let mut view = PresentationView::default();
        view.apply("presentation-start", &json!({ "team": "Alpha", "timer": 0 }));
        view.apply("timer-update", &json!({ "timer": 1e300 }));
        assert_eq!(view.timer_secs, i64::MAX);
        view.tick();
        assert_eq!(view.timer_secs, i64::MAX);

        view.apply("timer-update", &json!({ "timer": -5 }));
        assert_eq!(view.timer_secs, 0);

        view.apply("timer-update", &json!({ "timer": 41.6 }));
        assert_eq!(view.timer_secs, 42);
        view.tick();
        assert_eq!(view.timer_secs, 43);
    }

    #[test]
    fn huge_time_limit_counts_down_without_overflow() {
        let mut view = PresentationView::default();
        view.apply("evaluation-toggle", &json!({ "enabled": true, "timeLimit": 1e300 }));
        view.tick();
        assert_eq!(view.evaluation_remaining_secs, Some(i64::MAX - 1));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut view = PresentationView::default();
        assert!(!view.apply("member-added", &json!({})));
        assert_eq!(view, PresentationView::default());
    }

    #[test]
    fn clock_formatting_pads_minutes_and_seconds() {
        assert_eq!(format_clock(435), "07:15");
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(-5), "00:00");
    }
}
