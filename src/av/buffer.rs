use super::{InputBuffer, InputDescriptor, MuxType};
use bytes::Bytes;

/// An owned injected buffer.
///
/// The descriptor is optional so that injectors which have not yet attached their
/// metadata can be represented; demultiplexing such a buffer fails.
#[derive(Debug, Clone)]
pub struct InjectBuffer {
    /// Raw buffer contents
    pub data: Bytes,
    /// Metadata attached by the injector
    pub descriptor: Option<InputDescriptor>,
}

impl InjectBuffer {
    /// Wraps `data` with a transport stream descriptor carrying no timing.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            descriptor: Some(InputDescriptor::new(MuxType::TransportStream)),
        }
    }

    /// Sets the presentation time passed on to collators.
    pub fn with_playback_time(mut self, time: u64) -> Self {
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.playback_time = Some(time);
        }
        self
    }

    /// Sets the decode time passed on to collators.
    pub fn with_decode_time(mut self, time: u64) -> Self {
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.decode_time = Some(time);
        }
        self
    }

    /// Drops the descriptor, as if the injector never attached one.
    pub fn without_descriptor(mut self) -> Self {
        self.descriptor = None;
        self
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl InputBuffer for InjectBuffer {
    fn descriptor(&self) -> Option<&InputDescriptor> {
        self.descriptor.as_ref()
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data[..])
    }
}
