pub mod alerts;
pub mod checkpoints;
pub mod geofence_events;
pub mod guards;
pub mod panic_alerts;
pub mod scans;
pub mod shifts;
pub mod sites;
pub mod users;

pub use alerts::AlertsRepository;
pub use checkpoints::CheckpointsRepository;
pub use geofence_events::GeofenceEventsRepository;
pub use guards::GuardsRepository;
pub use panic_alerts::PanicAlertsRepository;
pub use scans::ScansRepository;
pub use shifts::ShiftsRepository;
pub use sites::SitesRepository;
pub use users::UsersRepository;
