pub mod batch;
pub mod descriptor;
pub mod influx;
pub mod line_protocol;
pub mod traits;

pub use batch::{Batch, BatchSettings, FieldValue, Point};
pub use descriptor::{DescriptorError, Precision, SinkDescriptor};
pub use influx::InfluxSink;
pub use traits::{Sink, SinkError};
