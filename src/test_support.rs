use chrono::{ TimeZone, Utc };

use crate::models::user::{ Platform, SessionCredential, UserProfile };

pub(crate) fn profile() -> UserProfile {
    let stamp = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    UserProfile {
        user_id: "u-1".into(),
        username: "amina".into(),
        credential: SessionCredential::new("token-abc"),
        logged_in: true,
        phone_number: "+15550100".into(),
        platform: Platform::Website,
        created_at: stamp,
        updated_at: stamp,
    }
}
