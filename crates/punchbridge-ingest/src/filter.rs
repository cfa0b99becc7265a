use punchbridge_types::CanonicalPunch;

/// Keep only real attendance events, in input order.
///
/// Punches with an identity of 0 or below are system events and are
/// dropped. With `store_images` off every surviving punch loses its image.
pub fn filter_batch(punches: Vec<CanonicalPunch>, store_images: bool) -> Vec<CanonicalPunch> {
    punches
        .into_iter()
        .filter(|punch| punch.enroll_id > 0)
        .map(|mut punch| {
            if !store_images {
                punch.image_payload = None;
            }
            punch
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn punch(enroll_id: i64) -> CanonicalPunch {
        CanonicalPunch {
            device_serial: Some("DEV1".into()),
            enroll_id,
            punch_time: Utc::now(),
            inout: None,
            mode: None,
            event: None,
            verifymode: None,
            temp: None,
            image_payload: Some("aW1n".into()),
            raw_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn drops_system_events_and_keeps_order() {
        let kept = filter_batch(vec![punch(3), punch(0), punch(-1), punch(1), punch(2)], true);
        let ids: Vec<i64> = kept.iter().map(|p| p.enroll_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn strips_images_when_retention_is_off() {
        let kept = filter_batch(vec![punch(1), punch(2)], false);
        assert!(kept.iter().all(|p| p.image_payload.is_none()));
    }

    #[test]
    fn keeps_images_when_retention_is_on() {
        let kept = filter_batch(vec![punch(1)], true);
        assert_eq!(kept[0].image_payload.as_deref(), Some("aW1n"));
    }

    #[test]
    fn all_system_events_yield_empty_batch() {
        assert!(filter_batch(vec![punch(0), punch(0)], false).is_empty());
    }
}
