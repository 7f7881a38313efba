//! Frame scheduling.
//!
//! The scheduler paces a bounded number of frames in flight between the CPU
//! and the GPU. Two counters run at independent rates:
//!
//! - `current_frame` cycles through the frame slots modulo the configured
//!   slot count
//! - the image index comes back from swapchain acquisition and may repeat
//!   non-periodically
//!
//! Whenever the target count differs from the slot count, an image can be
//! claimed by a slot other than the one about to reuse it. The
//! [`ImageLocks`] map records, per image, the fence of whichever slot last
//! claimed it; waiting on that fence before touching the image's resources
//! is what keeps a slow-presenting image from being overwritten.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use cube_rhi::device::Device;
use cube_rhi::swapchain::Swapchain;
use cube_rhi::sync::FrameSlot;
use cube_rhi::{RhiError, RhiResult};

/// Per-image record of the fence of the slot currently using that image.
pub struct ImageLocks {
    fences: Vec<Option<vk::Fence>>,
}

impl ImageLocks {
    /// Creates an empty map for `image_count` presentation targets.
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    /// Returns the fence of the slot that last claimed this image, if any.
    #[inline]
    pub fn pending(&self, image_index: usize) -> Option<vk::Fence> {
        self.fences[image_index]
    }

    /// Records that the slot owning `fence` now uses this image.
    #[inline]
    pub fn claim(&mut self, image_index: usize, fence: vk::Fence) {
        self.fences[image_index] = Some(fence);
    }

    /// Returns the number of tracked images.
    #[inline]
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Returns true when no images are tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// Advances a slot index modulo the slot count.
#[inline]
fn next_slot(current: usize, slot_count: usize) -> usize {
    (current + 1) % slot_count
}

/// Paces CPU submission against GPU execution and presentation.
///
/// Owns the frame slots and the image-locks map. Not thread-safe: the fence
/// protocol serializes GPU-side reuse, and the loop itself is the only
/// CPU-side writer.
pub struct FrameScheduler {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// The frame slots, cycled modulo their count.
    slots: Vec<FrameSlot>,
    /// Which slot's fence each presentation target is tied to.
    image_locks: ImageLocks,
    /// Index of the slot the next frame will use.
    current_frame: usize,
}

impl FrameScheduler {
    /// Creates a scheduler with `frames_in_flight` slots over `image_count`
    /// presentation targets.
    ///
    /// # Errors
    ///
    /// Returns an error if synchronization primitive creation fails.
    pub fn new(
        device: Arc<Device>,
        frames_in_flight: usize,
        image_count: usize,
    ) -> RhiResult<Self> {
        if frames_in_flight == 0 {
            return Err(RhiError::InvalidHandle(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let slots = (0..frames_in_flight)
            .map(|_| FrameSlot::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame scheduler created: {} frames in flight over {} presentation targets",
            frames_in_flight, image_count
        );

        Ok(Self {
            device,
            slots,
            image_locks: ImageLocks::new(image_count),
            current_frame: 0,
        })
    }

    /// Returns the current slot index.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Returns the number of frame slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until the current slot's previous frame has retired.
    ///
    /// This is the backpressure point: the CPU cannot run more than the
    /// slot count ahead of the GPU. The wait is unbounded.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence wait fails.
    pub fn throttle(&self) -> RhiResult<()> {
        self.slots[self.current_frame].in_flight().wait(u64::MAX)?;
        Ok(())
    }

    /// Acquires the next presentable image.
    ///
    /// The current slot's image-available semaphore is signaled when the
    /// image becomes usable. Any failure, including an out-of-date surface,
    /// is fatal: this renderer never rebuilds its swapchain.
    ///
    /// # Errors
    ///
    /// Returns the underlying Vulkan error on failure.
    pub fn acquire(&self, swapchain: &Swapchain) -> RhiResult<u32> {
        let slot = &self.slots[self.current_frame];

        let (image_index, suboptimal) = swapchain
            .acquire_next_image(slot.image_available().handle())
            .map_err(RhiError::Vulkan)?;

        if suboptimal {
            debug!("Swapchain reported suboptimal during acquire");
        }

        Ok(image_index)
    }

    /// Blocks until the slot that last claimed this image has retired.
    ///
    /// Necessary in addition to [`throttle`](Self::throttle) whenever the
    /// target count exceeds the slot count: the image may still be in use by
    /// a different slot than the current one.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence wait fails.
    pub fn wait_for_image(&self, image_index: u32) -> RhiResult<()> {
        if let Some(fence) = self.image_locks.pending(image_index as usize) {
            let fences = [fence];
            unsafe {
                self.device
                    .handle()
                    .wait_for_fences(&fences, true, u64::MAX)?;
            }
        }
        Ok(())
    }

    /// Ties this image to the current slot's fence.
    pub fn claim_image(&mut self, image_index: u32) {
        let fence = self.slots[self.current_frame].in_flight().handle();
        self.image_locks.claim(image_index as usize, fence);
    }

    /// Submits a pre-recorded command buffer for the current frame.
    ///
    /// Resets the slot fence, then submits to the graphics queue waiting on
    /// the image-available semaphore at the color-attachment-output stage
    /// only (earlier stages may overlap acquisition latency) and signaling
    /// both the render-finished semaphore and the slot fence.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence reset or queue submission fails.
    pub fn submit(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        let slot = &self.slots[self.current_frame];

        let wait_semaphores = [slot.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.render_finished().handle()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        slot.in_flight().reset()?;

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                slot.in_flight().handle(),
            )?;
        }

        Ok(())
    }

    /// Queues the image for presentation, waiting on render-finished.
    ///
    /// Out-of-date and suboptimal results are fatal or logged respectively;
    /// neither triggers recovery.
    ///
    /// # Errors
    ///
    /// Returns the underlying Vulkan error on failure.
    pub fn present(&self, swapchain: &Swapchain, image_index: u32) -> RhiResult<()> {
        let slot = &self.slots[self.current_frame];

        let suboptimal = swapchain
            .present(
                self.device.present_queue(),
                image_index,
                slot.render_finished().handle(),
            )
            .map_err(RhiError::Vulkan)?;

        if suboptimal {
            debug!("Swapchain reported suboptimal during present");
        }

        Ok(())
    }

    /// Advances to the next frame slot.
    pub fn advance(&mut self) {
        self.current_frame = next_slot(self.current_frame, self.slots.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_slot_index_cycles_modulo_slot_count() {
        // Two slots over any number of targets: 0, 1, 0, 1, 0
        let mut current = 0;
        let mut observed = vec![current];
        for _ in 0..4 {
            current = next_slot(current, 2);
            observed.push(current);
        }
        assert_eq!(observed, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_image_locks_start_empty() {
        let locks = ImageLocks::new(3);
        assert_eq!(locks.len(), 3);
        for i in 0..3 {
            assert!(locks.pending(i).is_none());
        }
    }

    #[test]
    fn test_image_locks_claim_and_replace() {
        let fence_a = vk::Fence::from_raw(1);
        let fence_b = vk::Fence::from_raw(2);

        let mut locks = ImageLocks::new(3);

        locks.claim(1, fence_a);
        assert_eq!(locks.pending(1), Some(fence_a));
        assert!(locks.pending(0).is_none());
        assert!(locks.pending(2).is_none());

        // A second slot claiming the same image replaces the record; the
        // caller must have waited on the previous fence first.
        locks.claim(1, fence_b);
        assert_eq!(locks.pending(1), Some(fence_b));
    }

    #[test]
    fn test_image_locks_track_targets_independently() {
        // Three targets over two slots: successive claims of different
        // images leave each image tied to the slot that last used it.
        let slot_fences = [vk::Fence::from_raw(10), vk::Fence::from_raw(20)];

        let mut locks = ImageLocks::new(3);
        let mut current = 0;

        // Acquisition order 0, 1, 2, 0 with two slots
        for &image in &[0usize, 1, 2, 0] {
            locks.claim(image, slot_fences[current]);
            current = next_slot(current, 2);
        }

        // Image 0 was re-claimed by slot 1 on the fourth frame
        assert_eq!(locks.pending(0), Some(slot_fences[1]));
        assert_eq!(locks.pending(1), Some(slot_fences[1]));
        assert_eq!(locks.pending(2), Some(slot_fences[0]));
    }
}
