//! Application services
//!
//! Concrete workload implementations. They depend on the container boundary
//! trait but are themselves concrete structs.

mod kafka_ui;

pub use kafka_ui::KafkaUiWorkload;
