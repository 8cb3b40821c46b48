//! Smart-home, news, calendar and travel collaborators used by routines.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Free-form routine input (sleep quality, calendar events, weather, trip details).
pub type RoutineContext = Map<String, Value>;

/// Outcome of a disruption check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disruption {
    /// Whether the trip is disrupted.
    pub detected: bool,
    /// Primary cause: `traffic_congestion`, `transit_delay`, `weather` or `unknown`.
    pub kind: String,
    /// `low`, `moderate`, `high` or `critical`.
    pub severity: String,
    /// Expected delay.
    pub estimated_delay_minutes: u64,
    /// Raw traffic, transit and weather readings.
    pub details: Value,
}

/// External collaborators a routine drives. Every call may fail independently.
#[async_trait]
pub trait RoutineServices: Send + Sync {
    /// Starts a smart device (the coffee maker in the morning routine).
    async fn start_device(&self, device: &str, context: &RoutineContext) -> Result<Value>;

    /// Sets lighting for the given sleep quality.
    async fn adjust_lighting(&self, sleep_quality: f64) -> Result<Value>;

    /// Builds a news briefing.
    async fn curate_news(&self, context: &RoutineContext) -> Result<Value>;

    /// Summarises today's calendar.
    async fn summarize_calendar(&self, context: &RoutineContext) -> Result<Value>;

    /// Checks traffic, transit and weather for a trip.
    async fn detect_disruption(&self, trip: &RoutineContext) -> Result<Disruption>;

    /// Finds an alternative route around a disruption.
    async fn find_alternative_route(
        &self,
        trip: &RoutineContext,
        disruption: &Disruption,
    ) -> Result<Value>;

    /// Tells the trip's contacts about the delay.
    async fn notify_contacts(&self, trip: &RoutineContext, disruption: &Disruption)
        -> Result<Value>;

    /// Moves calendar entries to the new arrival time.
    async fn update_calendar(&self, trip: &RoutineContext, rerouting: &Value) -> Result<Value>;
}

/// Deterministic stand-ins for the real collaborators. Trip readings can be
/// overridden through `traffic_delay_minutes`, `transit_status` and `weather_severity`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedRoutineServices;

impl SimulatedRoutineServices {
    fn events_today(context: &RoutineContext, now: DateTime<Utc>) -> Vec<Value> {
        context
            .get("calendar_events")
            .and_then(Value::as_array)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| {
                        event
                            .get("start")
                            .and_then(Value::as_str)
                            .and_then(|start| DateTime::parse_from_rfc3339(start).ok())
                            .is_some_and(|start| start.with_timezone(&Utc).date_naive() == now.date_naive())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn preparation_needs(events: &[Value]) -> Vec<String> {
        let mut needs = Vec::new();
        for event in events {
            let title = event.get("title").and_then(Value::as_str).unwrap_or_default();
            if title.to_lowercase().contains("presentation") {
                needs.push("Review presentation materials".to_string());
            }
            if let Some(location) = event.get("location").and_then(Value::as_str) {
                if !location.is_empty() && !location.to_lowercase().contains("office") {
                    needs.push("Plan transportation".to_string());
                }
            }
        }
        needs
    }
}

fn disruption_kind(traffic_delay: u64, transit_delayed: bool, weather_severe: bool) -> &'static str {
    if traffic_delay > 20 {
        "traffic_congestion"
    } else if transit_delayed {
        "transit_delay"
    } else if weather_severe {
        "weather"
    } else {
        "unknown"
    }
}

fn disruption_severity(total_delay: u64, weather_severe: bool) -> &'static str {
    if total_delay > 45 || weather_severe {
        "critical"
    } else if total_delay > 20 {
        "high"
    } else if total_delay > 10 {
        "moderate"
    } else {
        "low"
    }
}

#[async_trait]
impl RoutineServices for SimulatedRoutineServices {
    async fn start_device(&self, device: &str, context: &RoutineContext) -> Result<Value> {
        let strength = context
            .get("coffee_preferences")
            .and_then(|prefs| prefs.get("strength"))
            .and_then(Value::as_str)
            .unwrap_or("medium");
        Ok(json!({
            "device": device,
            "action": "brewing",
            "ready_in_minutes": 12,
            "strength": strength,
        }))
    }

    async fn adjust_lighting(&self, sleep_quality: f64) -> Result<Value> {
        let brightness = if sleep_quality < 0.6 { 60 } else { 70 };
        Ok(json!({
            "action": "adjusted",
            "brightness": brightness,
            "transition_time": "10 minutes",
        }))
    }

    async fn curate_news(&self, context: &RoutineContext) -> Result<Value> {
        let weather = context.get("weather");
        let condition = weather
            .and_then(|w| w.get("condition"))
            .and_then(Value::as_str)
            .unwrap_or("clear");
        let temperature = weather
            .and_then(|w| w.get("temperature"))
            .and_then(Value::as_f64)
            .unwrap_or(20.0);
        let items = vec![
            json!({
                "category": "technology",
                "headline": "AI advances in mobile computing",
                "summary": "New breakthrough in on-device AI processing",
                "relevance": 0.9,
            }),
            json!({
                "category": "weather",
                "headline": format!("Expect {condition} conditions today"),
                "summary": format!("Temperature: {temperature}°C"),
                "relevance": 1.0,
            }),
        ];
        Ok(json!({
            "total_count": items.len(),
            "items": items,
            "estimated_reading_time": "3 minutes",
        }))
    }

    async fn summarize_calendar(&self, context: &RoutineContext) -> Result<Value> {
        let today = Self::events_today(context, Utc::now());
        let Some(first) = today.first() else {
            return Ok(json!({ "summary": "No events scheduled today", "events": [] }));
        };
        let summary = format!(
            "You have {} events today. First: {} at {}",
            today.len(),
            first.get("title").and_then(Value::as_str).unwrap_or("untitled"),
            first.get("start").and_then(Value::as_str).unwrap_or("unknown"),
        );
        Ok(json!({
            "summary": summary,
            "preparation_needed": Self::preparation_needs(&today),
            "events": today.into_iter().take(5).collect::<Vec<_>>(),
        }))
    }

    async fn detect_disruption(&self, trip: &RoutineContext) -> Result<Disruption> {
        let traffic_delay = trip
            .get("traffic_delay_minutes")
            .and_then(Value::as_u64)
            .unwrap_or(22);
        let public = trip.get("transport_mode").and_then(Value::as_str) == Some("public");
        let transit_status = trip
            .get("transit_status")
            .and_then(Value::as_str)
            .unwrap_or(if public { "delayed" } else { "normal" });
        let transit_delay = if transit_status == "delayed" { 15 } else { 0 };
        let weather_severity = trip
            .get("weather_severity")
            .and_then(Value::as_str)
            .unwrap_or("moderate");
        let transit_delayed = transit_status == "delayed";
        let weather_severe = weather_severity == "high";
        Ok(Disruption {
            detected: traffic_delay > 15 || transit_delayed || weather_severe,
            kind: disruption_kind(traffic_delay, transit_delayed, weather_severe).to_string(),
            severity: disruption_severity(traffic_delay + transit_delay, weather_severe)
                .to_string(),
            estimated_delay_minutes: traffic_delay,
            details: json!({
                "traffic": { "delay_minutes": traffic_delay },
                "transit": { "status": transit_status, "delay_minutes": transit_delay },
                "weather": { "severity": weather_severity },
            }),
        })
    }

    async fn find_alternative_route(
        &self,
        _trip: &RoutineContext,
        disruption: &Disruption,
    ) -> Result<Value> {
        let now = Utc::now();
        let route = |name: &str, minutes: i64, km: u32, traffic: &str| {
            json!({
                "route_name": name,
                "duration_minutes": minutes,
                "distance_km": km,
                "traffic_level": traffic,
                "arrival_time": (now + Duration::minutes(minutes)).format("%H:%M").to_string(),
            })
        };
        let alternatives = vec![
            route("Alternative via Highway 2", 35, 28, "moderate"),
            route("Scenic route via local roads", 42, 25, "light"),
        ];
        Ok(json!({
            "recommended_route": alternatives[0],
            "alternatives": alternatives,
            "original_delay": disruption.estimated_delay_minutes,
        }))
    }

    async fn notify_contacts(
        &self,
        trip: &RoutineContext,
        disruption: &Disruption,
    ) -> Result<Value> {
        let message = format!(
            "Running approximately {} minutes late due to {}.",
            disruption.estimated_delay_minutes,
            disruption.kind.replace('_', " ")
        );
        let sent: Vec<Value> = trip
            .get("notify_contacts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(|contact| {
                json!({ "contact": contact, "method": "sms", "status": "sent", "message": message })
            })
            .collect();
        Ok(json!({ "total_sent": sent.len(), "notifications": sent }))
    }

    async fn update_calendar(&self, _trip: &RoutineContext, rerouting: &Value) -> Result<Value> {
        Ok(json!({
            "updated": true,
            "new_arrival": rerouting["recommended_route"]["arrival_time"],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(value: Value) -> RoutineContext {
        match value {
            Value::Object(map) => map,
            _ => RoutineContext::new(),
        }
    }

    #[tokio::test]
    async fn lighting_dims_after_poor_sleep() {
        let services = SimulatedRoutineServices;
        assert_eq!(services.adjust_lighting(0.5).await.unwrap()["brightness"], 60);
        assert_eq!(services.adjust_lighting(0.8).await.unwrap()["brightness"], 70);
    }

    #[tokio::test]
    async fn calendar_counts_only_today() {
        let now = Utc::now();
        let ctx = context(json!({
            "calendar_events": [
                { "title": "Team presentation", "start": now.to_rfc3339(), "location": "Client HQ" },
                { "title": "Later", "start": (now + Duration::days(3)).to_rfc3339() },
                { "title": "Broken", "start": "not a date" },
            ]
        }));
        let summary = SimulatedRoutineServices.summarize_calendar(&ctx).await.unwrap();
        assert!(summary["summary"]
            .as_str()
            .unwrap()
            .starts_with("You have 1 events today. First: Team presentation"));
        assert_eq!(
            summary["preparation_needed"],
            json!(["Review presentation materials", "Plan transportation"])
        );
        let empty = SimulatedRoutineServices
            .summarize_calendar(&RoutineContext::new())
            .await
            .unwrap();
        assert_eq!(empty["summary"], "No events scheduled today");
    }

    #[tokio::test]
    async fn disruption_rules() {
        let services = SimulatedRoutineServices;
        let default = services.detect_disruption(&RoutineContext::new()).await.unwrap();
        assert!(default.detected);
        assert_eq!(default.kind, "traffic_congestion");
        assert_eq!(default.severity, "high");

        let calm = services
            .detect_disruption(&context(json!({ "traffic_delay_minutes": 5 })))
            .await
            .unwrap();
        assert!(!calm.detected);

        let storm = services
            .detect_disruption(&context(json!({
                "traffic_delay_minutes": 0,
                "weather_severity": "high"
            })))
            .await
            .unwrap();
        assert!(storm.detected);
        assert_eq!(storm.kind, "weather");
        assert_eq!(storm.severity, "critical");

        let transit = services
            .detect_disruption(&context(json!({
                "traffic_delay_minutes": 0,
                "transport_mode": "public"
            })))
            .await
            .unwrap();
        assert_eq!(transit.kind, "transit_delay");
        assert_eq!(transit.severity, "moderate");
    }
}
