// Attendance Tracker Library - location, address and photo backed check-ins
// This exposes the core components for testing and integration

pub mod address;
pub mod bootstrap;
pub mod camera;
pub mod config;
pub mod geolocation;
pub mod observability;
pub mod permissions;
pub mod persistence;
pub mod telemetry;
pub mod types;
pub mod workflow;

// Re-export key types for easy access
pub use address::{AddressResolver, GeminiClient, GenerativeAddressResolver, TextCompletion};
pub use bootstrap::{build_app, AttendanceApp};
pub use camera::{CameraDevice, CameraError, CameraStatus, CaptureSession, Capturer};
pub use config::{config, init_config, AttendanceConfig};
pub use geolocation::{DeviceGeoLocator, GeoLocator, LocationError, PositionOptions, PositionSource};
pub use observability::{AddressLookupMetrics, AddressLookupStats};
pub use permissions::{Capability, PermissionPrompter, PermissionState, PermissionStore};
pub use persistence::{HttpPersistence, PersistenceClient, PersistenceError, SimulatedPersistence};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use types::{AttendanceRecord, Coordinates, PartialRecord, RecordField};
pub use workflow::{AttendanceWorkflow, WorkflowError, WorkflowSnapshot, WorkflowStep};
