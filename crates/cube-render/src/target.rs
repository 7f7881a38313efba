//! Presentation targets.
//!
//! One [`PresentationTarget`] exists per swapchain image and aggregates
//! everything that image owns: its framebuffer, its uniform buffer, its
//! descriptor set and its pre-recorded command buffer. Every handle in a
//! bundle refers to the same logical image.
//!
//! The set is built once after the swapchain and never changes size.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use cube_rhi::buffer::{Buffer, BufferUsage};
use cube_rhi::command::CommandPool;
use cube_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, update_descriptor_sets};
use cube_rhi::device::Device;
use cube_rhi::pipeline::{Pipeline, PipelineLayout};
use cube_rhi::render_pass::RenderPass;
use cube_rhi::swapchain::Swapchain;
use cube_rhi::{RhiError, RhiResult};

use crate::ubo::TransformsUbo;

/// Everything one swapchain image owns.
pub struct PresentationTarget {
    /// Framebuffer combining this image's color view with the shared depth view.
    framebuffer: vk::Framebuffer,
    /// This image's uniform buffer, rewritten whenever the image is reused.
    uniform_buffer: Buffer,
    /// Descriptor set pointing at this image's uniform buffer.
    descriptor_set: vk::DescriptorSet,
    /// Command buffer recorded once at startup and replayed every frame.
    command_buffer: vk::CommandBuffer,
}

impl PresentationTarget {
    /// Returns the framebuffer handle.
    #[inline]
    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Returns the descriptor set handle.
    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Returns the pre-recorded command buffer.
    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Writes the transform payload into this target's uniform buffer.
    ///
    /// Keyed by image index, not frame slot: the command buffer bound to
    /// this image references this image's own uniform buffer.
    pub fn write_uniform(&self, ubo: &TransformsUbo) -> RhiResult<()> {
        self.uniform_buffer.write_data(0, bytemuck::bytes_of(ubo))
    }
}

/// The fixed set of presentation targets, one per swapchain image.
pub struct TargetSet {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Targets indexed by swapchain image index.
    targets: Vec<PresentationTarget>,
}

impl TargetSet {
    /// Builds one target per swapchain image.
    ///
    /// Creates the framebuffers (each image's color view plus the single
    /// shared depth view), the per-image uniform buffers, and the
    /// descriptor sets wired to those buffers. Command buffers are recorded
    /// separately via [`record_commands`](Self::record_commands).
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::FramebufferCreation`] naming the failing index,
    /// or any buffer/descriptor error.
    pub fn new(
        device: Arc<Device>,
        swapchain: &Swapchain,
        depth_view: vk::ImageView,
        render_pass: &RenderPass,
        set_layout: &DescriptorSetLayout,
        descriptor_pool: &DescriptorPool,
    ) -> RhiResult<Self> {
        let image_count = swapchain.image_count();
        let extent = swapchain.extent();

        let layouts = vec![set_layout.handle(); image_count];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        let mut targets = Vec::with_capacity(image_count);

        for (i, &descriptor_set) in descriptor_sets.iter().enumerate() {
            let attachments = [swapchain.image_view(i), depth_view];

            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass.handle())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe {
                device
                    .handle()
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(|e| RhiError::FramebufferCreation { index: i, source: e })?
            };

            let uniform_buffer = Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                TransformsUbo::SIZE as vk::DeviceSize,
            )?;

            let buffer_infos = [vk::DescriptorBufferInfo::default()
                .buffer(uniform_buffer.handle())
                .offset(0)
                .range(TransformsUbo::SIZE as vk::DeviceSize)];

            let writes = [vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos)];
            update_descriptor_sets(&device, &writes);

            debug!("Created presentation target {}", i);

            targets.push(PresentationTarget {
                framebuffer,
                uniform_buffer,
                descriptor_set,
                command_buffer: vk::CommandBuffer::null(),
            });
        }

        info!("Created {} presentation targets", targets.len());

        Ok(Self { device, targets })
    }

    /// Records one command buffer per target.
    ///
    /// Each buffer is recorded exactly once and replayed every frame: begin
    /// the render pass on the target's framebuffer clearing color to black
    /// and depth to 1.0, bind the pipeline, the vertex buffer and the
    /// target's own descriptor set, draw, end.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or recording fails.
    pub fn record_commands(
        &mut self,
        command_pool: &CommandPool,
        render_pass: &RenderPass,
        pipeline: &Pipeline,
        pipeline_layout: &PipelineLayout,
        vertex_buffer: &Buffer,
        vertex_count: u32,
        extent: vk::Extent2D,
    ) -> RhiResult<()> {
        let command_buffers = command_pool.allocate_command_buffers(self.targets.len() as u32)?;

        for (target, command_buffer) in self.targets.iter_mut().zip(command_buffers) {
            let begin_info = vk::CommandBufferBeginInfo::default();

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: [0.0, 0.0, 0.0, 1.0],
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ];

            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(render_pass.handle())
                .framebuffer(target.framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            unsafe {
                let device = self.device.handle();

                device.begin_command_buffer(command_buffer, &begin_info)?;

                device.cmd_begin_render_pass(
                    command_buffer,
                    &render_pass_begin,
                    vk::SubpassContents::INLINE,
                );
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.handle(),
                );
                device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer.handle()], &[0]);
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline_layout.handle(),
                    0,
                    &[target.descriptor_set],
                    &[],
                );
                device.cmd_draw(command_buffer, vertex_count, 1, 0, 0);
                device.cmd_end_render_pass(command_buffer);

                device.end_command_buffer(command_buffer)?;
            }

            target.command_buffer = command_buffer;
        }

        info!("Recorded {} command buffers", self.targets.len());

        Ok(())
    }

    /// Returns the target for a swapchain image index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn target(&self, index: usize) -> &PresentationTarget {
        &self.targets[index]
    }

    /// Returns the number of targets.
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true when the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Drop for TargetSet {
    fn drop(&mut self) {
        // Framebuffers are destroyed here; uniform buffers drop themselves,
        // and descriptor sets / command buffers are reclaimed by their pools.
        unsafe {
            for target in &self.targets {
                self.device
                    .handle()
                    .destroy_framebuffer(target.framebuffer, None);
            }
        }
        debug!("Destroyed {} presentation targets", self.targets.len());
    }
}
