use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct ServiceHealth {
    pub service_name: String,
    pub status: ServiceStatus,
    pub response_time: Duration,
    pub error_message: Option<String>,
}

pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Classifies one probe result by HTTP status, mirroring the original
/// orchestrator's `check_service_health`: 200 is healthy, 5xx is
/// unhealthy, anything else (4xx, unexpected 2xx/3xx) is degraded.
pub fn classify(service_name: &str, result: Result<(u16, Duration), Duration>) -> ServiceHealth {
    match result {
        Ok((status, response_time)) if status == 200 => ServiceHealth {
            service_name: service_name.to_string(),
            status: ServiceStatus::Healthy,
            response_time,
            error_message: None,
        },
        Ok((status, response_time)) if status >= 500 => ServiceHealth {
            service_name: service_name.to_string(),
            status: ServiceStatus::Unhealthy,
            response_time,
            error_message: Some(format!("HTTP {status}")),
        },
        Ok((status, response_time)) => ServiceHealth {
            service_name: service_name.to_string(),
            status: ServiceStatus::Degraded,
            response_time,
            error_message: Some(format!("HTTP {status}")),
        },
        Err(response_time) => ServiceHealth {
            service_name: service_name.to_string(),
            status: ServiceStatus::Unhealthy,
            response_time,
            error_message: Some("request failed".to_string()),
        },
    }
}

/// Whether more than half of `health` reports are unhealthy, the condition
/// spec ties to an emergency shutdown.
pub fn majority_unhealthy(health: &[ServiceHealth]) -> bool {
    if health.is_empty() {
        return false;
    }
    let unhealthy = health
        .iter()
        .filter(|h| h.status == ServiceStatus::Unhealthy)
        .count();
    unhealthy * 2 > health.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_hundred_is_healthy() {
        let health = classify("core", Ok((200, Duration::from_millis(10))));
        assert_eq!(health.status, ServiceStatus::Healthy);
    }

    #[test]
    fn five_hundred_is_unhealthy() {
        let health = classify("core", Ok((503, Duration::from_millis(10))));
        assert_eq!(health.status, ServiceStatus::Unhealthy);
    }

    #[test]
    fn four_hundred_is_degraded() {
        let health = classify("core", Ok((404, Duration::from_millis(10))));
        assert_eq!(health.status, ServiceStatus::Degraded);
    }

    #[test]
    fn connection_failure_is_unhealthy() {
        let health = classify("core", Err(Duration::from_millis(10)));
        assert_eq!(health.status, ServiceStatus::Unhealthy);
    }

    #[test]
    fn escalates_only_when_more_than_half_are_unhealthy() {
        let two_of_four_unhealthy = vec![
            classify("a", Ok((503, Duration::from_millis(1)))),
            classify("b", Ok((503, Duration::from_millis(1)))),
            classify("c", Ok((200, Duration::from_millis(1)))),
            classify("d", Ok((200, Duration::from_millis(1)))),
        ];
        assert!(!majority_unhealthy(&two_of_four_unhealthy));

        let three_of_four_unhealthy = vec![
            classify("a", Ok((503, Duration::from_millis(1)))),
            classify("b", Ok((503, Duration::from_millis(1)))),
            classify("c", Ok((503, Duration::from_millis(1)))),
            classify("d", Ok((200, Duration::from_millis(1)))),
        ];
        assert!(majority_unhealthy(&three_of_four_unhealthy));
    }
}
