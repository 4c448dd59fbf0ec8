//! Volumetric Light-Shaft Pass
//!
//! Ray-marches atmospheric scattering from the main light at reduced
//! resolution, softens it with the Kawase pyramid and composites it back
//! onto the camera color.
//!
//! # Frame Structure
//!
//! ```text
//! on_camera_setup
//!   ├─ globals  _CameraDepthTexture, _CameraColorTexture
//!   ├─ allocate _OddBuffer (full res), _EvenBuffer, _LowResDepthTexture
//!   └─ bind program parameters (settings, _TexParams, view-projections)
//!
//! execute                                   [profiling scope]
//!   ├─ blit camera color → _OddBuffer        (working copy, _SourceTex)
//!   ├─ LightContribution: camera → _EvenBuffer
//!   ├─ toggle _TRANSPARENT_COLOR_ON
//!   ├─ Kawase pyramid over _EvenBuffer, result copied back
//!   ├─ _LightShaftTex = _EvenBuffer
//!   ├─ LowResDepth: camera → _LowResDepthTexture (_LowResDepthTex)
//!   └─ Composite: _OddBuffer → camera color
//!
//! on_camera_cleanup
//!   ├─ release the three frame targets
//!   └─ end the pool frame; anything still live is a leak
//! ```
//!
//! # Degradation
//!
//! - No shading program: every hook records nothing and the camera output
//!   is left untouched. Phases still advance.
//! - No blur compute: the pyramid is skipped and the unblurred
//!   contribution is composited.
//!
//! Both are reported once, at construction.

use glam::Mat4;
use log::{debug, error, warn};

use crate::errors::{LightShaftError, Result};
use crate::renderer::binding::ParameterBinder;
use crate::renderer::compute::ComputeKernels;
use crate::renderer::graph::commands::CommandList;
use crate::renderer::graph::frame::{FrameContext, FrameInfo};
use crate::renderer::graph::node::CameraPass;
use crate::renderer::graph::passes::kawase_blur::{BlurOutput, KawaseBlur};
use crate::renderer::graph::stage::RenderPassEvent;
use crate::renderer::graph::transient_pool::{
    FilterMode, RenderTarget, RenderTargetId, TargetDesc, TexturePool,
};
use crate::renderer::program::{ProgramFactory, ShadingProgram, SubPass};
use crate::renderer::registry::ShaderIds;
use crate::resources::light_shaft::PassSettings;

/// Format of the low-resolution depth buffer.
pub const LOW_RES_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

/// Where the pass is in its per-camera cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PassPhase {
    #[default]
    Idle,
    Setup,
    Executed,
}

impl PassPhase {
    /// The hook the host must call next.
    #[must_use]
    pub const fn next_hook(self) -> &'static str {
        match self {
            Self::Idle => "on_camera_setup",
            Self::Setup => "execute",
            Self::Executed => "on_camera_cleanup",
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct FrameTargets {
    working: RenderTarget,
    light_shaft: RenderTarget,
    low_res_depth: RenderTarget,
}

/// The light-shaft post-process for one camera.
pub struct LightShaftPass {
    settings: PassSettings,
    program: Option<Box<dyn ShadingProgram>>,
    blur: KawaseBlur,
    pool: TexturePool,
    ids: ShaderIds,
    binder: ParameterBinder,

    phase: PassPhase,
    frame: Option<FrameContext>,
    targets: Option<FrameTargets>,
    previous_view_projection: Option<Mat4>,
    last_blur: Option<BlurOutput>,
}

impl LightShaftPass {
    /// Builds the pass with a private texture pool.
    pub fn new(
        settings: PassSettings,
        programs: &dyn ProgramFactory,
        compute: Option<&dyn ComputeKernels>,
    ) -> Self {
        Self::with_pool(settings, programs, compute, TexturePool::new())
    }

    /// Builds the pass around an existing pool (and its registry).
    ///
    /// Out-of-range settings are clamped into their documented ranges.
    pub fn with_pool(
        settings: PassSettings,
        programs: &dyn ProgramFactory,
        compute: Option<&dyn ComputeKernels>,
        mut pool: TexturePool,
    ) -> Self {
        if let Err(err) = settings.validate() {
            warn!("{err}; clamping light shaft settings into range");
        }
        let settings = settings.clamped();

        let source = settings.program_source();
        let program = programs.create_program(&source);
        if program.is_none() {
            let err = LightShaftError::MissingProgram {
                source_name: source.name().to_owned(),
            };
            warn!("{err}; light shaft pass disabled");
        }

        let ids = ShaderIds::new(pool.registry_mut());
        let blur = KawaseBlur::new(compute);

        Self {
            settings,
            program,
            blur,
            pool,
            ids,
            binder: ParameterBinder::new(ids),
            phase: PassPhase::Idle,
            frame: None,
            targets: None,
            previous_view_projection: None,
            last_blur: None,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    /// `false` when the shading program failed to construct.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.program.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_blur_available(&self) -> bool {
        self.blur.is_available()
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn insertion_point(&self) -> RenderPassEvent {
        self.settings.insertion_point
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    /// Mutable access to the pool, for targets the host shares with it.
    #[inline]
    pub fn pool_mut(&mut self) -> &mut TexturePool {
        &mut self.pool
    }

    #[inline]
    #[must_use]
    pub fn shader_ids(&self) -> &ShaderIds {
        &self.ids
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> PassPhase {
        self.phase
    }

    /// Context of the frame in progress (between Setup and Cleanup).
    #[inline]
    #[must_use]
    pub fn frame_context(&self) -> Option<&FrameContext> {
        self.frame.as_ref()
    }

    /// The blur recorded by the most recent Execute, if it ran.
    #[inline]
    #[must_use]
    pub fn last_blur(&self) -> Option<&BlurOutput> {
        self.last_blur.as_ref()
    }

    /// Drops pooled textures unused for more than `max_idle_frames` frames.
    pub fn trim(&mut self, max_idle_frames: u32) {
        self.pool.trim(max_idle_frames);
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn expect_phase(&self, required: PassPhase, found: &'static str) -> Result<()> {
        if self.phase == required {
            Ok(())
        } else {
            Err(LightShaftError::PhaseOrder {
                expected: self.phase.next_hook(),
                found,
            })
        }
    }

    fn light_shaft_desc(&self, ctx: &FrameContext) -> TargetDesc {
        TargetDesc {
            width: ctx.low_res_size.x,
            height: ctx.low_res_size.y,
            format: self.settings.light_shaft_format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            mip_level_count: 1,
            filter: FilterMode::Point,
            label: "LightShaft Buffer",
        }
    }

    fn allocate_frame_targets(
        &mut self,
        ctx: &FrameContext,
        cmd: &mut CommandList,
    ) -> Result<FrameTargets> {
        let working_desc = TargetDesc {
            width: ctx.base_size.x,
            height: ctx.base_size.y,
            format: ctx.camera_format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST,
            mip_level_count: 1,
            filter: FilterMode::Point,
            label: "LightShaft Working Color",
        };
        let light_shaft_desc = self.light_shaft_desc(ctx);
        let depth_desc = TargetDesc {
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            ..light_shaft_desc
                .with_format(LOW_RES_DEPTH_FORMAT)
                .with_label("LightShaft Low-Res Depth")
        };

        // A failed allocation drops the scope, releasing the ones before it.
        let mut scope = self.pool.scope(cmd);
        let working = scope.allocate(RenderTargetId::new(self.ids.working_color), &working_desc)?;
        let light_shaft = scope.allocate(
            RenderTargetId::new(self.ids.light_shaft_buffer),
            &light_shaft_desc,
        )?;
        let low_res_depth = scope.allocate(
            RenderTargetId::new(self.ids.low_res_depth_buffer),
            &depth_desc,
        )?;
        scope.keep();

        Ok(FrameTargets {
            working,
            light_shaft,
            low_res_depth,
        })
    }

    fn record_execute(
        &mut self,
        ctx: &FrameContext,
        targets: &FrameTargets,
        cmd: &mut CommandList,
    ) -> Result<()> {
        let ids = self.ids;
        let working = targets.working.texture_ref();
        let light_shaft = targets.light_shaft.texture_ref();
        let low_res_depth = targets.low_res_depth.texture_ref();

        cmd.blit(ctx.camera_color, working, None);
        cmd.set_global_texture(ids.source_tex, working);
        cmd.blit(ctx.camera_color, light_shaft, Some(SubPass::LightContribution));

        if let Some(program) = self.program.as_deref_mut() {
            program.set_feature(ids.transparent_color_on, self.settings.transparent.enabled);
        }

        let level_desc = self
            .light_shaft_desc(ctx)
            .with_label("LightShaft Kawase Level");
        let radius = self.settings.effective_blur_radius();
        self.last_blur = {
            let mut scope = self.pool.scope(cmd);
            let output = self
                .blur
                .record(&mut scope, &targets.light_shaft, &level_desc, radius)?;
            if let Some(out) = &output {
                scope
                    .commands()
                    .blit(out.result.texture_ref(), light_shaft, None);
                scope.release(out.result.id)?;
            }
            output
        };

        cmd.set_global_texture(ids.light_shaft_tex, light_shaft);
        cmd.blit(ctx.camera_color, low_res_depth, Some(SubPass::LowResDepth));
        cmd.set_global_texture(ids.low_res_depth_tex, low_res_depth);
        cmd.blit(working, ctx.camera_color, Some(SubPass::Composite));
        Ok(())
    }
}

impl CameraPass for LightShaftPass {
    fn name(&self) -> &str {
        &self.settings.profiler_tag
    }

    fn event(&self) -> RenderPassEvent {
        self.settings.insertion_point
    }

    fn on_camera_setup(&mut self, frame: &FrameInfo, cmd: &mut CommandList) -> Result<()> {
        self.expect_phase(PassPhase::Idle, "on_camera_setup")?;

        if self.program.is_none() {
            self.phase = PassPhase::Setup;
            return Ok(());
        }

        let ctx = FrameContext::new(
            frame,
            self.settings.down_sample,
            self.previous_view_projection,
        );
        debug!(
            "light shaft setup: camera {}×{} → low-res {}×{} (down sample {})",
            ctx.base_size.x,
            ctx.base_size.y,
            ctx.low_res_size.x,
            ctx.low_res_size.y,
            self.settings.down_sample.factor(),
        );

        cmd.set_global_texture(self.ids.camera_depth, ctx.camera_depth);
        cmd.set_global_texture(self.ids.camera_color, ctx.camera_color);
        let targets = self.allocate_frame_targets(&ctx, cmd)?;

        if let Some(program) = self.program.as_deref_mut() {
            self.binder.bind(program, &self.settings, &ctx);
        }

        self.previous_view_projection = Some(ctx.view_projection);
        self.frame = Some(ctx);
        self.targets = Some(targets);
        self.phase = PassPhase::Setup;
        Ok(())
    }

    fn execute(&mut self, _frame: &FrameInfo, cmd: &mut CommandList) -> Result<()> {
        self.expect_phase(PassPhase::Setup, "execute")?;
        self.phase = PassPhase::Executed;
        self.last_blur = None;

        let (Some(ctx), Some(targets)) = (self.frame, self.targets) else {
            return Ok(());
        };

        cmd.begin_sample(&self.settings.profiler_tag);
        let result = self.record_execute(&ctx, &targets, cmd);
        cmd.end_sample(&self.settings.profiler_tag);
        result
    }

    fn on_camera_cleanup(&mut self, cmd: &mut CommandList) -> Result<()> {
        self.expect_phase(PassPhase::Executed, "on_camera_cleanup")?;
        self.phase = PassPhase::Idle;
        self.frame = None;

        if let Some(targets) = self.targets.take() {
            for target in [targets.working, targets.light_shaft, targets.low_res_depth] {
                if let Err(err) = self.pool.release(cmd, target.id) {
                    error!("light shaft cleanup: {err}");
                }
            }
        }

        let leaked = self.pool.end_frame(cmd);
        if leaked.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = leaked
            .iter()
            .map(|id| self.pool.registry().resolve(id.name()).to_owned())
            .collect();
        let err = LightShaftError::LeakedTargets { ids };
        error!("{err}");
        Err(err)
    }
}
