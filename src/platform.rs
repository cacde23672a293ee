use std::f64::consts::PI;

/// Edge length of a leaf block standing on a platform
pub const LEAF_NODE_EDGE: f64 = 256.0;
/// Gap kept between neighbouring platforms along the arc
pub const PLATFORM_SPACING_WIDTH: f64 = 512.0;

const EDGE05: f64 = 0.5 * LEAF_NODE_EDGE;
const EDGE15: f64 = 1.5 * LEAF_NODE_EDGE;

/// Result of sizing a platform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformShape {
    pub depth: f64,
    pub arc_width: f64,
}

/// Plan area needed to hold `child_count` leaves laid out in a square grid.
pub fn estimated_area(child_count: usize) -> f64 {
    let n = child_count.max(1) as f64;
    let k = EDGE15 * n.sqrt().ceil() + EDGE05;
    k * k
}

/// Depth and arc width giving plan area `area` at inner radius `r0` with
/// an outer-edge-to-depth ratio of exactly one. No rounding or clamping.
///
/// The outer edge, less the spacing `w` between neighbouring platforms,
/// must be as long as the platform is deep:
///
/// ```text
/// s = PI*theta*(r + d)/180 - w,  s = d
/// d^3 + (2r + w)d^2 + (2wr - 2A - w)d - 2Ar = 0
/// theta = 180*(d + w)/(PI*(r + d))
/// ```
///
/// The cubic has one positive root for `area > 0` and `r0 > 0`, taken
/// through the trigonometric form of Cardano's formula.
pub fn solve_shape(area: f64, r0: f64) -> PlatformShape {
    assert!(area > 0.0 && r0 > 0.0, "platform solve needs positive area and radius");

    let w = PLATFORM_SPACING_WIDTH;
    let (w2, w3, w4) = (w * w, w * w * w, w * w * w * w);
    let a = area;
    let (a2, a3) = (a * a, a * a * a);
    let r = r0;
    let (r2, r3, r4) = (r * r, r * r * r, r * r * r * r);

    let ka = 72.0 * (a * r - w * (a + r)) - 64.0 * r3 + 48.0 * r2 * w - 36.0 * w2
        + 24.0 * r * w2
        - 8.0 * w3;

    let t1 = 72.0 * a * w2 - 132.0 * a * r * w2 - 240.0 * a * w * r3 + 120.0 * a * w2 * r2
        - 24.0 * a2 * w * r
        - 60.0 * w3 * r;
    let t2 = 12.0 * (w2 * r2 + a2 * w2 - w4 * r + w4 * r2 + a * w3 + w3);
    let t3 = 48.0 * (w2 * r4 - w2 * r3 - w3 * r3) + 96.0 * (a3 + w3 * r2);
    let t4 = 192.0 * a * r4 + 156.0 * a2 * r2 + 3.0 * w4 + 144.0 * a2 * w + 264.0 * a * w * r2;
    let kb = 12.0 * (t1 + t2 + t3 + t4).max(0.0).sqrt();

    let kc = (kb.atan2(ka) / 3.0).cos();
    let kd = ka.hypot(kb).cbrt();

    let d = (-w - 2.0 * r) / 3.0
        + ((8.0 * r2 - 4.0 * w * r + 2.0 * w2) / 3.0 + 4.0 * a + 2.0 * w) * kc / kd
        + kc * kd / 6.0;
    let theta = 180.0 * (d + w) / (PI * (r + d));

    PlatformShape {
        depth: d,
        arc_width: theta,
    }
}

/// Smallest arc width whose inner edge can carry two leaves plus the
/// inter-platform gap.
pub fn min_arc_width(r0: f64) -> f64 {
    (180.0 * (2.0 * LEAF_NODE_EDGE + PLATFORM_SPACING_WIDTH) / PI) / r0
}

/// Round a depth up so that a whole number of leaf rows fits.
pub fn quantize_depth(depth: f64) -> f64 {
    depth + (EDGE15 - (depth - EDGE05) % EDGE15) + EDGE05
}

/// Full reshape of a directory with `child_count` children at inner radius `r0`.
///
/// The row rounding and the minimum arc width are applied after the
/// solve, so small directories end up wider or deeper than square.
pub fn reshape(child_count: usize, r0: f64) -> PlatformShape {
    let raw = solve_shape(estimated_area(child_count), r0);
    PlatformShape {
        depth: quantize_depth(raw.depth),
        arc_width: raw.arc_width.max(min_arc_width(r0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn outer_edge(shape: PlatformShape, r0: f64) -> f64 {
        PI * shape.arc_width * (r0 + shape.depth) / 180.0 - PLATFORM_SPACING_WIDTH
    }

    fn plan_area(shape: PlatformShape, r0: f64) -> f64 {
        let r1 = r0 + shape.depth;
        PI * shape.arc_width / 360.0 * (r1 * r1 - r0 * r0) - PLATFORM_SPACING_WIDTH * shape.depth
    }

    #[test]
    fn test_estimated_area() {
        // One child and no children both get a single cell
        assert_eq!(estimated_area(0), 512.0 * 512.0);
        assert_eq!(estimated_area(1), 512.0 * 512.0);
        // 5 children need a 3x3 grid
        assert_eq!(estimated_area(5), (384.0 * 3.0 + 128.0) * (384.0 * 3.0 + 128.0));
    }

    #[test]
    fn test_solve_satisfies_cubic() {
        let (a, r) = (1.0e6, 8192.0);
        let shape = solve_shape(a, r);
        let d = shape.depth;
        let w = PLATFORM_SPACING_WIDTH;
        let residual = d * d * d + (2.0 * r + w) * d * d + (2.0 * w * r - 2.0 * a - w) * d - 2.0 * a * r;
        assert!(d > 0.0);
        assert!(residual.abs() / (2.0 * a * r) < 1e-6, "residual {residual}");
    }

    #[test]
    fn test_more_children_more_room() {
        let r = 12_000.0;
        let small = solve_shape(estimated_area(4), r);
        let large = solve_shape(estimated_area(40), r);
        assert!(large.depth > small.depth);
        assert!(large.arc_width > small.arc_width);
        assert!(plan_area(large, r) > plan_area(small, r));
    }

    #[test]
    fn test_quantize_depth_fits_whole_rows() {
        for depth in [10.0, 500.0, 640.0, 1000.0, 5000.0] {
            let q = quantize_depth(depth);
            assert!(q > depth);
            let rows = (q - LEAF_NODE_EDGE) / EDGE15;
            assert!((rows - rows.round()).abs() < 1e-9, "{depth} -> {q}");
        }
    }

    #[test]
    fn test_reshape_clamps_arc_width() {
        // A single child at a big radius solves to a sliver
        let r0 = 200_000.0;
        let raw = solve_shape(estimated_area(1), r0);
        let shaped = reshape(1, r0);
        assert!(raw.arc_width < min_arc_width(r0));
        assert_eq!(shaped.arc_width, min_arc_width(r0));
    }

    proptest! {
        #[test]
        fn test_aspect_ratio_one_before_clamps(
            children in 1usize..400,
            r0 in 1000.0f64..500_000.0,
        ) {
            let shape = solve_shape(estimated_area(children), r0);
            prop_assert!(shape.depth > 0.0);
            prop_assert!(shape.arc_width > 0.0);
            let s = outer_edge(shape, r0);
            prop_assert!((s - shape.depth).abs() <= 1e-6 * shape.depth.max(1.0),
                "outer edge {} vs depth {}", s, shape.depth);
        }

        #[test]
        fn test_reshape_never_below_minimum(children in 0usize..400, r0 in 1000.0f64..500_000.0) {
            let shaped = reshape(children, r0);
            prop_assert!(shaped.arc_width >= min_arc_width(r0));
            prop_assert!(shaped.depth >= LEAF_NODE_EDGE);
        }
    }
}
