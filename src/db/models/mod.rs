pub mod alert_models;
pub mod checkpoint_models;
pub mod geofence_models;
pub mod guard_models;
pub mod panic_models;
pub mod scan_models;
pub mod shift_models;
pub mod site_models;
pub mod user_models;
