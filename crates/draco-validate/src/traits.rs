//! Extension points for callers.
//!
//! This crate never decodes compressed geometry itself. A caller that links
//! a Draco decoder can plug it in through [`PositionDecoder`]:
//!
//! ```ignore
//! use draco_validate::{extract_with_decoder, PositionDecoder};
//!
//! struct MyDecoder;
//!
//! impl PositionDecoder for MyDecoder {
//!     fn decode_positions(
//!         &self,
//!         descriptor: &CompressionDescriptor,
//!         payload: &[u8],
//!     ) -> Result<Vec<Vec3>, DecodeUnavailable> {
//!         let bytes = descriptor
//!             .payload_slice(payload)
//!             .ok_or_else(|| DecodeUnavailable::new("descriptor has no usable bufferView"))?;
//!         my_codec::decode_positions(bytes).map_err(|e| DecodeUnavailable::new(e.to_string()))
//!     }
//! }
//!
//! let extraction = extract_with_decoder(&scene, payload, Some(&MyDecoder));
//! ```

use crate::error::DecodeUnavailable;
use crate::scene::CompressionDescriptor;
use crate::Vec3;

/// Decodes the positions of a compressed primitive.
///
/// Implementations receive the compression descriptor and the whole payload
/// chunk of the file the primitive belongs to; the descriptor's byte range
/// locates the stream within it. One decoder serves both files of a
/// comparison. Positions must come back in the primitive's vertex order.
pub trait PositionDecoder {
    fn decode_positions(
        &self,
        descriptor: &CompressionDescriptor,
        payload: &[u8],
    ) -> Result<Vec<Vec3>, DecodeUnavailable>;
}

impl<D: PositionDecoder + ?Sized> PositionDecoder for &D {
    fn decode_positions(
        &self,
        descriptor: &CompressionDescriptor,
        payload: &[u8],
    ) -> Result<Vec<Vec3>, DecodeUnavailable> {
        (**self).decode_positions(descriptor, payload)
    }
}

/// A decoder that always reports that decoding is unavailable.
///
/// Useful when a caller wants every compressed mesh reported as undecodable
/// with an explicit reason.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecoder;

impl PositionDecoder for NoDecoder {
    fn decode_positions(
        &self,
        descriptor: &CompressionDescriptor,
        _payload: &[u8],
    ) -> Result<Vec<Vec3>, DecodeUnavailable> {
        Err(DecodeUnavailable::new(format!(
            "no decoder available for {}",
            descriptor.extension
        )))
    }
}
