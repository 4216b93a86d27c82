use std::net::IpAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;

use thankmap_types::events::{Blink, Submission};
use thankmap_types::models::valid_coordinates;
use thankmap_types::{MAX_MESSAGE_CHARS, SHORT_CODE_ALPHABET, SHORT_CODE_LEN};

use crate::Gateway;

/// Reasons a submission is turned away before it reaches storage.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("coordinates out of range ({lat}, {lng})")]
    CoordinatesOutOfRange { lat: f64, lng: f64 },

    #[error("message is empty")]
    EmptyMessage,

    #[error("rate limited, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },
}

impl Rejection {
    /// Text shown to the submitter. Only rate limiting is reported back;
    /// every other rejection is dropped silently.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::RateLimited { retry_after } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(format!(
                    "You are being too grateful! Please wait {} seconds.",
                    secs.max(1)
                ))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("database write error: {0:#}")]
    Storage(anyhow::Error),
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone)]
pub struct Accepted {
    /// Share link for the submitter
    pub link: String,
    /// Jittered copy for everyone else
    pub blink: Blink,
}

/// Validate, rate-limit and persist a submission.
pub async fn submit(
    gateway: &Gateway,
    client_ip: IpAddr,
    submission: Submission,
) -> Result<Accepted, SubmitError> {
    let Submission { message, lat, lng, temp_id } = submission;

    if !valid_coordinates(lat, lng) {
        return Err(Rejection::CoordinatesOutOfRange { lat, lng }.into());
    }

    let message = sanitize_message(&message);
    if message.trim().is_empty() {
        return Err(Rejection::EmptyMessage.into());
    }

    gateway.limiter.check(client_ip, Instant::now())?;

    let short_code = generate_short_code(&mut rand::rng());

    // Run blocking DB insert off the async runtime
    let db = gateway.db.clone();
    let row = tokio::task::spawn_blocking(move || db.insert_gratitude(&message, lat, lng, &short_code))
        .await
        .map_err(|e| SubmitError::Storage(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(SubmitError::Storage)?;

    let (blink_lat, blink_lng) = jitter(lat, lng, gateway.settings.jitter_degrees, &mut rand::rng());

    Ok(Accepted {
        link: share_link(&gateway.settings.share_base_url, &row.short_code),
        blink: Blink {
            id: row.id,
            message: row.message,
            lat: blink_lat,
            lng: blink_lng,
            temp_id,
            short_code: row.short_code,
        },
    })
}

/// Escape HTML angle brackets, then cut to [`MAX_MESSAGE_CHARS`] characters.
pub fn sanitize_message(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped.chars().take(MAX_MESSAGE_CHARS).collect()
}

pub fn generate_short_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHORT_CODE_LEN)
        .map(|_| SHORT_CODE_ALPHABET[rng.random_range(0..SHORT_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Offset a point by up to `spread / 2` degrees on each axis so live blinks
/// don't pinpoint the submitter. The result stays a valid coordinate.
pub fn jitter<R: Rng + ?Sized>(lat: f64, lng: f64, spread: f64, rng: &mut R) -> (f64, f64) {
    if spread <= 0.0 {
        return (lat, lng);
    }
    let lat = lat + rng.random::<f64>() * spread - spread / 2.0;
    let lng = lng + rng.random::<f64>() * spread - spread / 2.0;
    (lat.clamp(-90.0, 90.0), lng.clamp(-180.0, 180.0))
}

pub fn share_link(base_url: &str, short_code: &str) -> String {
    format!("{}/share/{}", base_url.trim_end_matches('/'), short_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewaySettings;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use thankmap_db::Database;
    use thankmap_types::is_share_code;

    fn gateway(jitter_degrees: f64) -> Gateway {
        let db = Arc::new(Database::open_in_memory().unwrap());
        Gateway::new(
            db,
            GatewaySettings {
                share_base_url: "https://example.test/".into(),
                jitter_degrees,
                ..GatewaySettings::default()
            },
        )
    }

    fn submission(message: &str, lat: f64, lng: f64) -> Submission {
        Submission {
            message: message.into(),
            lat,
            lng,
            temp_id: Some("tmp42".into()),
        }
    }

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7));

    #[test]
    fn sanitize_escapes_markup() {
        assert_eq!(
            sanitize_message("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
        assert_eq!(sanitize_message("thanks & love"), "thanks & love");
    }

    #[test]
    fn sanitize_truncates_by_characters() {
        let long = "é".repeat(400);
        let clean = sanitize_message(&long);
        assert_eq!(clean.chars().count(), MAX_MESSAGE_CHARS);

        let exact = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(sanitize_message(&exact), exact);
    }

    #[test]
    fn short_codes_are_url_safe() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_short_code(&mut rng);
            assert_eq!(code.len(), SHORT_CODE_LEN);
            assert!(is_share_code(&code));
        }
    }

    #[test]
    fn jitter_stays_within_spread() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let (lat, lng) = jitter(10.0, 20.0, 0.1, &mut rng);
            assert!((lat - 10.0).abs() <= 0.05);
            assert!((lng - 20.0).abs() <= 0.05);
        }
    }

    #[test]
    fn jitter_keeps_points_on_the_globe() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let (lat, lng) = jitter(90.0, -180.0, 0.1, &mut rng);
            assert!((-90.0..=90.0).contains(&lat));
            assert!((-180.0..=180.0).contains(&lng));
        }
    }

    #[test]
    fn zero_spread_disables_jitter() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(jitter(1.5, 2.5, 0.0, &mut rng), (1.5, 2.5));
    }

    #[test]
    fn rate_limit_message_rounds_up() {
        let rejection = Rejection::RateLimited { retry_after: Duration::from_millis(14_200) };
        assert_eq!(
            rejection.user_message().as_deref(),
            Some("You are being too grateful! Please wait 15 seconds.")
        );
        assert!(Rejection::EmptyMessage.user_message().is_none());
    }

    #[tokio::test]
    async fn accepted_submission_is_stored_and_linked() {
        let gw = gateway(0.0);
        let accepted = submit(&gw, IP, submission("<b>thank you</b>", 40.0, -73.0)).await.unwrap();

        assert_eq!(accepted.blink.message, "&lt;b&gt;thank you&lt;/b&gt;");
        assert_eq!(accepted.blink.temp_id.as_deref(), Some("tmp42"));
        assert_eq!((accepted.blink.lat, accepted.blink.lng), (40.0, -73.0));
        assert_eq!(
            accepted.link,
            format!("https://example.test/share/{}", accepted.blink.short_code)
        );

        let stored = gw.db.gratitude_by_code(&accepted.blink.short_code).unwrap().unwrap();
        assert_eq!(stored.id, accepted.blink.id);
        assert_eq!((stored.lat, stored.lng), (40.0, -73.0));
    }

    #[tokio::test]
    async fn out_of_range_is_rejected_without_cooldown() {
        let gw = gateway(0.1);
        let err = submit(&gw, IP, submission("hi", 91.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(Rejection::CoordinatesOutOfRange { .. })));

        let err = submit(&gw, IP, submission("hi", f64::NAN, 0.0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(Rejection::CoordinatesOutOfRange { .. })));

        assert_eq!(gw.limiter.tracked(), 0);
        assert!(gw.db.recent_gratitudes(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let gw = gateway(0.1);
        let err = submit(&gw, IP, submission("   ", 0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(Rejection::EmptyMessage)));
    }

    #[tokio::test]
    async fn storage_failure_aborts_but_keeps_cooldown() {
        let gw = gateway(0.1);
        gw.db
            .with_conn(|conn| {
                conn.execute_batch("DROP TABLE gratitudes")?;
                Ok(())
            })
            .unwrap();

        let err = submit(&gw, IP, submission("lost", 0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Storage(_)));

        // The cooldown starts on acceptance, before the insert is attempted
        assert_eq!(gw.limiter.tracked(), 1);
        let err = submit(&gw, IP, submission("retry", 0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(Rejection::RateLimited { .. })));
    }

    #[tokio::test]
    async fn second_submission_is_rate_limited() {
        let gw = gateway(0.1);
        submit(&gw, IP, submission("first", 0.0, 0.0)).await.unwrap();

        let err = submit(&gw, IP, submission("second", 0.0, 0.0)).await.unwrap_err();
        match err {
            SubmitError::Rejected(rejection) => assert!(rejection.user_message().is_some()),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(gw.db.recent_gratitudes(10).unwrap().len(), 1);
    }
}
