//! Kawase Blur Pyramid Tests
//!
//! Tests for:
//! - Schedule maths (level count, fractional blend) over sampled radii
//! - Monotonicity of the level count in blur intensity
//! - Allocation / release balance of the recorded pyramid
//! - The zero-radius single-cycle path on actual pixels
//! - Dispatch sizing with per-kernel thread-group sizes

mod support;

use glam::{UVec2, UVec3, Vec4};

use lightshafts::renderer::compute::BlurKernel;
use lightshafts::renderer::graph::passes::{BlurSchedule, KawaseBlur, half_size};
use lightshafts::renderer::graph::{
    CommandList, FilterMode, RenderCommand, RenderTargetId, TargetDesc, TextureRef, TexturePool,
};
use lightshafts::renderer::registry::{ParamRegistry, ShaderIds};

use support::{CpuExecutor, Image, MockCompute};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn level_desc() -> TargetDesc {
    TargetDesc {
        width: 1,
        height: 1,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
        mip_level_count: 1,
        filter: FilterMode::Point,
        label: "test level",
    }
}

struct Recorded {
    pool: TexturePool,
    cmd: CommandList,
    source_id: RenderTargetId,
    schedule: BlurSchedule,
}

/// Records one blur of a written `size` source and releases its result.
fn record_blur(compute: &MockCompute, size: UVec2, radius: f32) -> Recorded {
    let mut pool = TexturePool::new();
    let mut cmd = CommandList::new();
    let blur = KawaseBlur::new(Some(compute));
    let source_id = pool.target_id("_EvenBuffer");
    let source = pool
        .allocate(&mut cmd, source_id, &level_desc().with_size(size))
        .unwrap();
    cmd.blit(TextureRef::CameraColor, source.texture_ref(), None);

    let schedule = {
        let mut scope = pool.scope(&mut cmd);
        let output = blur
            .record(&mut scope, &source, &level_desc(), radius)
            .unwrap()
            .expect("compute is available");
        assert_eq!(output.result.size, size, "result lives at the source size");
        scope.release(output.result.id).unwrap();
        output.schedule
    };

    Recorded {
        pool,
        cmd,
        source_id,
        schedule,
    }
}

fn pyramid_allocations(recorded: &Recorded) -> Vec<&str> {
    recorded
        .cmd
        .iter()
        .filter_map(|c| match c {
            RenderCommand::AllocateTarget { id, .. } if *id != recorded.source_id => {
                Some(recorded.pool.registry().resolve(id.name()))
            }
            _ => None,
        })
        .collect()
}

/// Texture bound to `name` by its (single) allocation in the recording.
fn texture_of(recorded: &Recorded, name: &str) -> TextureRef {
    recorded
        .cmd
        .iter()
        .find_map(|c| match c {
            RenderCommand::AllocateTarget { id, texture, .. }
                if recorded.pool.registry().resolve(id.name()) == name =>
            {
                Some(TextureRef::Pooled(*texture))
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("{name} was never allocated"))
}

/// Name of the target allocated on `texture`.
fn name_of(recorded: &Recorded, texture: TextureRef) -> String {
    recorded
        .cmd
        .iter()
        .find_map(|c| match c {
            RenderCommand::AllocateTarget { id, texture: t, .. }
                if TextureRef::Pooled(*t) == texture =>
            {
                Some(recorded.pool.registry().resolve(id.name()).to_owned())
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("{texture:?} was never allocated"))
}

// ============================================================================
// Schedule
// ============================================================================

#[test]
fn schedule_count_and_ratio_in_range() {
    for i in 0..=2000 {
        let radius = i as f32 * 0.137;
        let s = BlurSchedule::from_radius(radius);
        let amount = (radius + 1.0).log2();

        assert_eq!(
            s.count,
            amount.floor() as u32,
            "count for R={radius} should be floor(log2(R+1))"
        );
        assert!(
            (0.0..1.0).contains(&s.ratio),
            "ratio for R={radius} out of [0,1): {}",
            s.ratio
        );
        assert!(approx(s.count as f32 + s.ratio, amount));
    }
}

#[test]
fn schedule_zero_radius_is_single_cycle() {
    let s = BlurSchedule::from_radius(0.0);
    assert_eq!(s.count, 0);
    assert_eq!(s.ratio, 0.0);
    assert_eq!(s.level_count(), 2);
    assert_eq!(s.dispatch_count(), 3);
}

#[test]
fn schedule_count_monotonic_in_intensity() {
    for max_radius in [0.0, 1.0, 7.5, 32.0, 100.0, 255.0] {
        let mut previous = 0;
        for step in 0..=100 {
            let intensity = step as f32 / 100.0;
            let count = BlurSchedule::from_radius(intensity * max_radius).count;
            assert!(
                count >= previous,
                "count decreased at intensity {intensity} (max radius {max_radius}): {previous} -> {count}"
            );
            previous = count;
        }
    }
}

#[test]
fn schedule_reference_radius_32() {
    let s = BlurSchedule::from_radius(32.0);
    assert_eq!(s.count, 5);
    assert!((s.ratio - 0.044).abs() < 1e-3, "ratio was {}", s.ratio);
    assert_eq!(s.level_count(), 7);
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn pyramid_level_count_matches_schedule() {
    let compute = MockCompute::new();
    for radius in [0.0, 0.5, 1.0, 2.5, 7.0, 32.0, 255.0] {
        let recorded = record_blur(&compute, UVec2::new(200, 120), radius);
        let names = pyramid_allocations(&recorded);
        let s = recorded.schedule;

        let expected = s.level_count() as usize + usize::from(s.uses_intermediate());
        assert_eq!(names.len(), expected, "allocations for R={radius}: {names:?}");

        let levels = names.iter().filter(|n| **n != format!("_KawaseRT{}", s.count + 1));
        assert_eq!(levels.count(), s.level_count() as usize);
    }
}

#[test]
fn pyramid_releases_every_allocation() {
    let compute = MockCompute::new();
    for radius in [0.0, 3.0, 32.0, 255.0] {
        let recorded = record_blur(&compute, UVec2::new(960, 540), radius);

        assert_eq!(
            recorded.pool.live_count(),
            1,
            "only the source should stay live for R={radius}"
        );
        let stats = recorded.pool.frame_stats();
        assert_eq!(stats.allocations, stats.releases + 1);
        assert!(recorded.cmd.read_before_write().is_empty());
    }
}

#[test]
fn pyramid_peak_live_is_bounded_by_depth() {
    let recorded = record_blur(&MockCompute::new(), UVec2::new(960, 540), 32.0);
    // source + every level + intermediate, at the start of the upsample walk
    assert_eq!(recorded.pool.frame_stats().peak_live, 1 + 7 + 1);
}

#[test]
fn pyramid_level_sizes_halve_rounding_up() {
    let recorded = record_blur(&MockCompute::new(), UVec2::new(15, 9), 7.0);
    let sizes: Vec<UVec2> = recorded
        .cmd
        .iter()
        .filter_map(|c| match c {
            RenderCommand::AllocateTarget { desc, .. } => Some(desc.size()),
            _ => None,
        })
        .collect();

    // source, _KawaseRT, _KawaseRT0..=_KawaseRT3, intermediate
    assert_eq!(sizes[1], UVec2::new(15, 9));
    assert_eq!(sizes[2], UVec2::new(8, 5));
    assert_eq!(sizes[3], UVec2::new(4, 3));
    assert_eq!(sizes[4], UVec2::new(2, 2));
    assert_eq!(sizes[5], UVec2::new(1, 1));
    assert_eq!(sizes[6], sizes[4], "intermediate is sized like level count");
    assert_eq!(half_size(UVec2::new(1, 1)), UVec2::ONE);
}

#[test]
fn dispatch_groups_use_kernel_group_size() {
    let compute = MockCompute::new()
        .with_group_size(BlurKernel::DownSample, UVec3::new(16, 16, 1))
        .with_group_size(BlurKernel::UpSample, UVec3::new(8, 4, 1))
        .with_group_size(BlurKernel::Lerp, UVec3::new(32, 1, 1));
    let recorded = record_blur(&compute, UVec2::new(100, 50), 0.0);
    let dispatches: Vec<_> = recorded.cmd.dispatches().collect();

    assert_eq!(dispatches.len(), 3);
    // down: 100×50 → 50×25
    assert_eq!(dispatches[0].kernel, BlurKernel::DownSample);
    assert_eq!(dispatches[0].groups, UVec3::new(4, 2, 1));
    // up: 50×25 → 100×50
    assert_eq!(dispatches[1].kernel, BlurKernel::UpSample);
    assert_eq!(dispatches[1].groups, UVec3::new(13, 13, 1));
    // lerp over the source size
    assert_eq!(dispatches[2].kernel, BlurKernel::Lerp);
    assert_eq!(dispatches[2].groups, UVec3::new(4, 50, 1));
    assert_eq!(dispatches[2].uniforms.blur_offset, 0.0);
}

#[test]
fn blend_uses_fractional_ratio() {
    let recorded = record_blur(&MockCompute::new(), UVec2::new(64, 64), 32.0);
    let blends: Vec<_> = recorded
        .cmd
        .dispatches()
        .filter(|d| d.kernel == BlurKernel::Lerp)
        .collect();

    assert_eq!(blends.len(), 1);
    assert!(approx(blends[0].uniforms.blur_offset, recorded.schedule.ratio));
    assert_eq!(
        blends[0].uniforms.source_size,
        Vec4::new(2.0, 2.0, 0.5, 0.5),
        "blend runs at the size of level count"
    );
}

// ============================================================================
// Pixels
// ============================================================================

#[test]
fn zero_radius_equals_single_down_up_cycle() {
    let size = UVec2::new(24, 16);
    let recorded = record_blur(&MockCompute::new(), size, 0.0);
    let ids = ShaderIds::new(&mut ParamRegistry::new());

    let input = Image::pattern(size);
    let mut executor = CpuExecutor::new(ids, input.clone());
    executor.run(&recorded.cmd);

    let source = recorded
        .cmd
        .iter()
        .find_map(|c| match c {
            RenderCommand::AllocateTarget { id, texture, .. } if *id == recorded.source_id => {
                Some(*texture)
            }
            _ => None,
        })
        .unwrap();
    let result = recorded
        .cmd
        .iter()
        .find_map(|c| match c {
            RenderCommand::AllocateTarget { id, texture, .. }
                if recorded.pool.registry().resolve(id.name()) == "_KawaseRT" =>
            {
                Some(*texture)
            }
            _ => None,
        })
        .unwrap();

    let expected = input
        .dual_sample(half_size(size), 1.0)
        .dual_sample(size, 1.0);
    assert_eq!(executor.image(TextureRef::Pooled(source)), &input);
    assert_eq!(executor.image(TextureRef::Pooled(result)), &expected);
}

#[test]
fn upsample_walk_routes_through_intermediate() {
    let recorded = record_blur(&MockCompute::new(), UVec2::new(48, 32), 5.0);
    assert_eq!(recorded.schedule.count, 2);

    let chain: Vec<(BlurKernel, String, String)> = recorded
        .cmd
        .dispatches()
        .map(|d| {
            (
                d.kernel,
                name_of(&recorded, d.source().unwrap()),
                name_of(&recorded, d.target().unwrap()),
            )
        })
        .collect();

    let expected = [
        (BlurKernel::DownSample, "_EvenBuffer", "_KawaseRT0"),
        (BlurKernel::DownSample, "_KawaseRT0", "_KawaseRT1"),
        (BlurKernel::DownSample, "_KawaseRT1", "_KawaseRT2"),
        // coarsest level into the intermediate
        (BlurKernel::UpSample, "_KawaseRT2", "_KawaseRT3"),
        // level count blended into the intermediate
        (BlurKernel::Lerp, "_KawaseRT1", "_KawaseRT3"),
        // after the swap the walk continues from the blended intermediate
        (BlurKernel::UpSample, "_KawaseRT3", "_KawaseRT0"),
        (BlurKernel::UpSample, "_KawaseRT0", "_KawaseRT"),
    ];
    assert_eq!(chain.len(), expected.len());
    for (i, ((kernel, src, dst), (e_kernel, e_src, e_dst))) in
        chain.iter().zip(expected).enumerate()
    {
        assert_eq!(
            (*kernel, src.as_str(), dst.as_str()),
            (e_kernel, e_src, e_dst),
            "dispatch {i}"
        );
    }

    let releases: Vec<&str> = recorded
        .cmd
        .iter()
        .filter_map(|c| match c {
            RenderCommand::ReleaseTarget { id, .. } => {
                Some(recorded.pool.registry().resolve(id.name()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        releases,
        ["_KawaseRT2", "_KawaseRT3", "_KawaseRT0", "_KawaseRT1", "_KawaseRT"],
        "the retired level count goes last, before the caller releases the result"
    );
}

#[test]
fn fractional_radius_equals_composed_reference() {
    let size = UVec2::new(48, 32);
    let recorded = record_blur(&MockCompute::new(), size, 5.0);
    let ratio = recorded.schedule.ratio;
    assert!(ratio > 0.5 && ratio < 0.6, "ratio was {ratio}");

    let ids = ShaderIds::new(&mut ParamRegistry::new());
    let input = Image::pattern(size);
    let mut executor = CpuExecutor::new(ids, input.clone());
    executor.run(&recorded.cmd);

    let s1 = half_size(size);
    let s2 = half_size(s1);
    let s3 = half_size(s2);
    let l1 = input.dual_sample(s1, 1.0);
    let l2 = l1.dual_sample(s2, 1.0);
    let l3 = l2.dual_sample(s3, 1.0);
    let up = l3.dual_sample(s2, 1.0);

    let lerp = |target: &Image, source: &Image| {
        let mut out = target.clone();
        for (d, s) in out.pixels.iter_mut().zip(&source.pixels) {
            *d = *d * (1.0 - ratio) + *s * ratio;
        }
        out
    };
    let expected = lerp(&up, &l2).dual_sample(s1, 1.0).dual_sample(size, 1.0);
    let swapped = lerp(&l2, &up).dual_sample(s1, 1.0).dual_sample(size, 1.0);

    let result = executor.image(texture_of(&recorded, "_KawaseRT"));
    let diff = result.max_abs_diff(&expected);
    assert!(diff < EPSILON, "result differs from reference by {diff}");
    assert!(
        result.max_abs_diff(&swapped) > 1e-4,
        "blend roles must not be interchangeable"
    );
}
