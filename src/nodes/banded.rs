// src/nodes/banded.rs

//! Split a per-pixel kernel into row-band work items.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::exec::{BuildContext, BuildJob, ImageBuffer, OutputSlots};

/// Build a job that evaluates `kernel(x, y)` for every pixel of a
/// `resolution x resolution` image, one item per band of `band_rows` rows.
///
/// Each item writes only its own band of the scratch buffer. The bands are
/// stitched and published to output pin 0 of `slots` on completion; the
/// scratch is released in cleanup whatever the outcome.
pub fn banded_job<K>(ctx: &BuildContext, slots: Arc<OutputSlots>, kernel: K) -> BuildJob
where
    K: Fn(usize, usize) -> f32 + Send + Sync + 'static,
{
    let size = ctx.resolution;
    let band_rows = ctx.band_rows.max(1);
    let generation = ctx.generation;
    let bands = size.div_ceil(band_rows);

    let scratch: Arc<Vec<Mutex<Vec<f32>>>> =
        Arc::new((0..bands).map(|_| Mutex::new(Vec::new())).collect());
    let kernel = Arc::new(kernel);

    let mut job = BuildJob::new();
    for band in 0..bands {
        let scratch = Arc::clone(&scratch);
        let kernel = Arc::clone(&kernel);
        job.push_item(move || {
            let first = band * band_rows;
            let last = (first + band_rows).min(size);
            let mut rows = Vec::with_capacity((last - first) * size);
            for y in first..last {
                for x in 0..size {
                    rows.push(kernel(x, y));
                }
            }
            *scratch[band].lock() = rows;
            Ok(())
        });
    }

    let stitched = Arc::clone(&scratch);
    let cleanup = Arc::clone(&scratch);
    job.on_complete(move || {
        let mut data = Vec::with_capacity(size * size);
        for band in stitched.iter() {
            data.extend_from_slice(&band.lock());
        }
        slots.publish(generation, 0, ImageBuffer::from_data(size, size, data));
    })
    .on_cleanup(move || {
        for band in cleanup.iter() {
            *band.lock() = Vec::new();
        }
        trace!(bands, "released band scratch buffers");
    })
}

/// Normalised pixel-centre coordinate.
pub fn unit(i: usize, size: usize) -> f32 {
    if size == 0 {
        0.0
    } else {
        (i as f32 + 0.5) / size as f32
    }
}
