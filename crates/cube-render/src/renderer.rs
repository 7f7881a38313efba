//! Renderer orchestration.
//!
//! Builds the whole stack once at startup, strictly in dependency order:
//! negotiate the device context, build the swapchain and targets, build the
//! fixed pipeline and resources, then hand control to the frame scheduler.
//! Shutdown reverses the order after draining the GPU.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use cube_core::{RenderConfig, Timer};
use cube_platform::{Surface, Window};
use cube_rhi::buffer::{Buffer, BufferUsage};
use cube_rhi::command::CommandPool;
use cube_rhi::context::DeviceContext;
use cube_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
use cube_rhi::device::Device;
use cube_rhi::diagnostics::{DiagnosticSink, TracingSink};
use cube_rhi::instance::Instance;
use cube_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use cube_rhi::render_pass::RenderPass;
use cube_rhi::shader::{Shader, ShaderStage};
use cube_rhi::swapchain::Swapchain;
use cube_rhi::vertex::ColoredVertex;
use cube_rhi::{RhiError, RhiResult};

use crate::depth_buffer::DepthBuffer;
use crate::geometry::{CUBE_VERTEX_COUNT, CUBE_VERTICES};
use crate::scheduler::FrameScheduler;
use crate::target::TargetSet;
use crate::ubo::TransformsUbo;

/// Pre-compiled SPIR-V shader locations.
const VERTEX_SHADER_PATH: &str = "shaders/spirv/cube.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/spirv/cube.frag.spv";

/// Owns every Vulkan resource and drives the per-frame loop.
///
/// # Resource Destruction Order
///
/// Vulkan requires dependents destroyed before their dependencies, so every
/// member is wrapped in `ManuallyDrop` and released explicitly in reverse
/// creation order, the logical device strictly before the surface and
/// instance.
pub struct Renderer {
    /// Vulkan instance (destroyed last).
    instance: ManuallyDrop<Instance>,
    /// Window surface (destroyed after the device, before the instance).
    surface: ManuallyDrop<Surface>,
    /// Logical device; this Arc is the last one standing at shutdown.
    device: ManuallyDrop<Arc<Device>>,
    /// Presentable image chain and per-image color views.
    swapchain: ManuallyDrop<Swapchain>,
    /// The single depth buffer shared by all framebuffers.
    depth_buffer: ManuallyDrop<DepthBuffer>,
    /// Render pass for the one subpass this renderer draws.
    render_pass: ManuallyDrop<RenderPass>,
    /// Descriptor set layout for the transform uniform.
    set_layout: ManuallyDrop<DescriptorSetLayout>,
    /// Pipeline layout over the descriptor set layout.
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    /// The fixed graphics pipeline.
    pipeline: ManuallyDrop<Pipeline>,
    /// Cube vertex buffer.
    vertex_buffer: ManuallyDrop<Buffer>,
    /// Pool the per-target descriptor sets live in.
    descriptor_pool: ManuallyDrop<DescriptorPool>,
    /// Pool the pre-recorded command buffers live in.
    command_pool: ManuallyDrop<CommandPool>,
    /// Per-image framebuffers, uniform buffers, sets and command buffers.
    targets: ManuallyDrop<TargetSet>,
    /// Frame slots and the images-in-flight map.
    scheduler: ManuallyDrop<FrameScheduler>,
    /// Wall clock driving the rotation animation.
    timer: Timer,
    /// Aspect ratio of the negotiated extent.
    aspect_ratio: f32,
}

impl Renderer {
    /// Initializes the full rendering stack for the given window.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation finds no suitable device or any
    /// resource creation fails; all failures here are fatal.
    pub fn new(window: &Window, config: &RenderConfig) -> RhiResult<Self> {
        info!(
            "Initializing renderer ({}x{}, {} frames in flight)",
            config.width, config.height, config.frames_in_flight
        );

        let surface_extensions = window
            .required_extensions()
            .map_err(|e| RhiError::Surface(e.to_string()))?;

        let sink: Option<Box<dyn DiagnosticSink>> = config
            .diagnostics
            .then(|| Box::new(TracingSink) as Box<dyn DiagnosticSink>);

        let instance = Instance::new(&surface_extensions, sink)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::Surface(e.to_string()))?;

        // Capability negotiation: first suitable device, queues, surface
        // format, present mode, extent and depth format.
        let context = DeviceContext::negotiate(
            &instance,
            surface.handle(),
            surface.loader(),
            vk::Extent2D {
                width: config.width,
                height: config.height,
            },
        )?;
        let device = context.device().clone();
        let aspect_ratio = context.aspect_ratio();

        // Presentable image chain and the shared depth buffer.
        let swapchain = Swapchain::new(&instance, &context, surface.handle(), surface.loader())?;
        let depth_buffer = DepthBuffer::new(device.clone(), context.extent(), context.depth_format())?;

        // Fixed pipeline: render pass, one uniform binding, two shaders.
        let render_pass = RenderPass::new(
            device.clone(),
            context.surface_format().format,
            context.depth_format(),
        )?;

        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)];
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;

        let pipeline_layout = PipelineLayout::new(device.clone(), &[set_layout.handle()])?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(VERTEX_SHADER_PATH),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(FRAGMENT_SHADER_PATH),
            ShaderStage::Fragment,
            "main",
        )?;

        let vertex_attributes = ColoredVertex::attribute_descriptions();
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(ColoredVertex::binding_description())
            .vertex_attributes(&vertex_attributes)
            .extent(context.extent())
            .cull_mode(CullMode::Back)
            .front_face(FrontFace::Clockwise)
            .depth_test(true)
            .build(device.clone(), &pipeline_layout, &render_pass)?;
        // Shader modules are no longer needed once the pipeline exists;
        // they drop here.

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&CUBE_VERTICES),
        )?;

        // Per-target resources: framebuffers, uniform buffers, descriptor
        // sets, and one command buffer per image recorded exactly once.
        let image_count = swapchain.image_count();
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(image_count as u32)];
        let descriptor_pool =
            DescriptorPool::new(device.clone(), image_count as u32, &pool_sizes)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or_else(|| RhiError::InvalidHandle("missing graphics queue family".to_string()))?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let mut targets = TargetSet::new(
            device.clone(),
            &swapchain,
            depth_buffer.image_view(),
            &render_pass,
            &set_layout,
            &descriptor_pool,
        )?;
        targets.record_commands(
            &command_pool,
            &render_pass,
            &pipeline,
            &pipeline_layout,
            &vertex_buffer,
            CUBE_VERTEX_COUNT,
            context.extent(),
        )?;

        let scheduler = FrameScheduler::new(device.clone(), config.frames_in_flight, image_count)?;

        info!(
            "Renderer initialized: {} presentation targets, {} frames in flight",
            image_count, config.frames_in_flight
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            swapchain: ManuallyDrop::new(swapchain),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            render_pass: ManuallyDrop::new(render_pass),
            set_layout: ManuallyDrop::new(set_layout),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            pipeline: ManuallyDrop::new(pipeline),
            vertex_buffer: ManuallyDrop::new(vertex_buffer),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            command_pool: ManuallyDrop::new(command_pool),
            targets: ManuallyDrop::new(targets),
            scheduler: ManuallyDrop::new(scheduler),
            timer: Timer::new(),
            aspect_ratio,
        })
    }

    /// Renders one frame.
    ///
    /// Runs the fixed per-iteration sequence: throttle on the current slot,
    /// acquire an image, rewrite that image's uniform buffer from elapsed
    /// time, cross-wait on whichever slot last used the image, claim it,
    /// submit the image's pre-recorded commands, present, advance.
    ///
    /// # Errors
    ///
    /// Any failure is fatal; the caller is expected to shut down.
    pub fn render_frame(&mut self) -> RhiResult<()> {
        self.scheduler.throttle()?;

        let image_index = self.scheduler.acquire(&self.swapchain)?;

        let ubo = TransformsUbo::at_time(self.timer.elapsed_secs(), self.aspect_ratio);
        self.targets.target(image_index as usize).write_uniform(&ubo)?;

        self.scheduler.wait_for_image(image_index)?;
        self.scheduler.claim_image(image_index);

        self.scheduler
            .submit(self.targets.target(image_index as usize).command_buffer())?;
        self.scheduler.present(&self.swapchain, image_index)?;

        self.scheduler.advance();

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Nothing may be destroyed while the GPU still references it.
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }

        unsafe {
            ManuallyDrop::drop(&mut self.scheduler);
            ManuallyDrop::drop(&mut self.targets);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.vertex_buffer);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.set_layout);
            // Last Arc: destroys the logical device before surface/instance.
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
