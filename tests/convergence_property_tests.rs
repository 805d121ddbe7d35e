use proptest::prelude::*;
use stripctl::color::{Rgb, hsv_white_to_rgb, hue_distance, lerp, lerp_hue, rgb_to_hue_sat};
use stripctl::core::animator::{is_converged, step_toward};
use stripctl::core::state::ColorIntent;

fn unit() -> impl Strategy<Value = f32> {
    0.0f32..1.0
}

fn speed() -> impl Strategy<Value = f32> {
    0.01f32..=1.0
}

fn intent() -> impl Strategy<Value = ColorIntent> {
    (unit(), 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=100.0)
        .prop_map(|(h, s, w, b)| ColorIntent::new(h, s, w, b))
}

/// Fully saturated colors with one channel at 255 and one at 0.
fn saturated_rgb() -> impl Strategy<Value = Rgb> {
    (0usize..6, any::<u8>()).prop_map(|(sector, c)| match sector {
        0 => Rgb::new(255, c, 0),
        1 => Rgb::new(c, 255, 0),
        2 => Rgb::new(0, 255, c),
        3 => Rgb::new(0, c, 255),
        4 => Rgb::new(c, 0, 255),
        _ => Rgb::new(255, 0, c),
    })
}

mod interpolation {
    use super::*;

    proptest! {
        #[test]
        fn lerp_identities(a in -100.0f32..100.0, b in -100.0f32..100.0, t in 0.0f32..=1.0) {
            prop_assert_eq!(lerp(a, a, t), a);
            prop_assert_eq!(lerp(a, b, 0.0), a);
            prop_assert!((lerp(a, b, 1.0) - b).abs() <= 1e-4);
        }

        #[test]
        fn lerp_hue_moves_along_shorter_arc(a in unit(), b in unit(), t in 0.01f32..=1.0) {
            let start = hue_distance(a, b);
            let next = lerp_hue(a, b, t);

            prop_assert!((0.0..1.0).contains(&next));
            // Distance covered plus distance remaining equals the short arc
            let covered = hue_distance(a, next);
            let remaining = hue_distance(next, b);
            prop_assert!((covered + remaining - start).abs() <= 1e-4,
                "a={a} b={b} t={t} next={next}");
            prop_assert!((remaining - start * (1.0 - t)).abs() <= 1e-4);
        }
    }
}

mod convergence {
    use super::*;

    proptest! {
        #[test]
        fn fixed_target_converges_without_overshoot(
            start in intent(),
            target in intent(),
            anim_speed in speed(),
            brightness_speed in speed(),
        ) {
            let mut display = start;
            let mut previous = (
                hue_distance(display.hue, target.hue),
                (display.saturation - target.saturation).abs(),
                (display.white_mix - target.white_mix).abs(),
                (display.brightness - target.brightness).abs(),
            );

            for _ in 0..2000 {
                let (next, _) = step_toward(display, target, anim_speed, brightness_speed);
                let distance = (
                    hue_distance(next.hue, target.hue),
                    (next.saturation - target.saturation).abs(),
                    (next.white_mix - target.white_mix).abs(),
                    (next.brightness - target.brightness).abs(),
                );
                prop_assert!(distance.0 <= previous.0 + 1e-5);
                prop_assert!(distance.1 <= previous.1 + 1e-6);
                prop_assert!(distance.2 <= previous.2 + 1e-6);
                prop_assert!(distance.3 <= previous.3 + 1e-4);

                // Never past the target on linear fields
                prop_assert!((next.saturation - target.saturation) * (start.saturation - target.saturation) >= -1e-6);
                prop_assert!((next.brightness - target.brightness) * (start.brightness - target.brightness) >= -1e-3);

                previous = distance;
                display = next;
                if is_converged(&display, &target, 1e-3) {
                    break;
                }
            }
            prop_assert!(is_converged(&display, &target, 1e-3));
        }

        #[test]
        fn hue_step_across_seam_is_bounded(
            offset in 0.0f32..0.2,
            back in 0.0f32..0.2,
            anim_speed in speed(),
        ) {
            // Start just below 1.0, target just above 0.0
            let display = ColorIntent::new(1.0 - back.max(1e-3), 1.0, 0.0, 100.0);
            let target = ColorIntent::new(offset, 1.0, 0.0, 100.0);
            let bound = hue_distance(display.hue, target.hue) * anim_speed + 1e-5;

            let (next, _) = step_toward(display, target, anim_speed, 0.2);
            // Landing exactly on the target is the only larger move allowed
            prop_assert!(hue_distance(display.hue, next.hue) <= bound || next.hue == target.hue,
                "jumped {} > {}", hue_distance(display.hue, next.hue), bound);
        }
    }
}

mod color_round_trip {
    use super::*;

    proptest! {
        #[test]
        fn saturated_colors_survive_hue_sat_round_trip(color in saturated_rgb()) {
            let (h, s) = rgb_to_hue_sat(
                f32::from(color.r) / 255.0,
                f32::from(color.g) / 255.0,
                f32::from(color.b) / 255.0,
            );
            let back = hsv_white_to_rgb(h, s, 0.0);
            for (a, b) in [(back.r, color.r), (back.g, color.g), (back.b, color.b)] {
                prop_assert!((i16::from(a) - i16::from(b)).abs() <= 1, "{color} -> {back}");
            }
        }
    }
}
