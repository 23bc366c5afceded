use proptest::prelude::*;
use shifter_core::{
    checksum, derive_params, reduce_to_bands, sieve_primes, step, AudioFrame, FrameInput,
    RenderSettings, SceneKind, SceneState,
};

fn is_prime(n: u32) -> bool {
    n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}

fn scene_kind() -> impl Strategy<Value = SceneKind> {
    prop_oneof![
        Just(SceneKind::Orb),
        Just(SceneKind::PulseBars),
        Just(SceneKind::ParticleField),
        Just(SceneKind::Spiral),
    ]
}

fn audio_frame() -> impl Strategy<Value = AudioFrame> {
    prop_oneof![
        Just(AudioFrame::Idle),
        (prop::collection::vec(-1.0f32..2.0, 0..8), -1.0f32..2.0)
            .prop_map(|(bands, level)| AudioFrame::Live { bands, level }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Each band is the mean of a byte slice over 255, so it is in [0, 1]
    #[test]
    fn prop_bands_are_normalised(
        bins in prop::collection::vec(any::<u8>(), 0..512),
        band_count in 1usize..32
    ) {
        let bands = reduce_to_bands(&bins, band_count);
        prop_assert_eq!(bands.len(), band_count);
        for v in &bands {
            prop_assert!((0.0..=1.0).contains(v), "band value {} out of range", v);
        }
        prop_assert_eq!(reduce_to_bands(&bins, band_count), bands);
    }

    #[test]
    fn prop_sieve_is_ascending_primes(upper in 0u32..2000) {
        let primes = sieve_primes(upper);
        prop_assert!(primes.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(primes.iter().all(|&p| p <= upper && is_prime(p)));
        let expected = (0..=upper).filter(|&n| is_prime(n)).count();
        prop_assert_eq!(primes.len(), expected);
    }

    #[test]
    fn prop_params_depend_only_on_checksum(key in "[a-zA-Z0-9 -]{0,24}") {
        prop_assert_eq!(derive_params(&key), derive_params(&key));

        let reversed: String = key.chars().rev().collect();
        prop_assert_eq!(checksum(&key), checksum(&reversed));
        prop_assert_eq!(derive_params(&key), derive_params(&reversed));

        let params = derive_params(&key);
        prop_assert!((3..=10).contains(&params.max_cycles));
        prop_assert!((0.3..0.8).contains(&params.opacity));
    }

    // Bundles only repeat when checksums agree modulo 7800, far above any
    // checksum these keys can reach
    #[test]
    fn prop_distinct_checksums_give_distinct_params(
        a in "[a-z]{1,24}",
        b in "[a-z]{1,24}"
    ) {
        prop_assume!(checksum(&a) != checksum(&b));
        prop_assert_ne!(derive_params(&a), derive_params(&b));
    }

    #[test]
    fn prop_step_stays_in_bounds(
        kind in scene_kind(),
        frames in prop::collection::vec((audio_frame(), -1.0f32..5.0), 1..30)
    ) {
        let settings = RenderSettings::default();
        let mut state = SceneState::new(kind, &settings);
        for (audio, dt) in &frames {
            let input = FrameInput {
                audio,
                settings: &settings,
            };
            let next = step(&state, &input, *dt);
            prop_assert!(next.elapsed() >= state.elapsed());
            prop_assert!(next.elapsed() - state.elapsed() <= settings.max_frame_dt_secs + 1e-6);
            state = next;

            let hue = state.primary_hue();
            prop_assert!((0.0..360.0).contains(&hue), "hue {} out of range", hue);
            let scale = state.primary_scale();
            match kind {
                SceneKind::PulseBars => prop_assert!((0.0..=1.0).contains(&scale)),
                _ => prop_assert!(
                    (settings.min_scale..=settings.max_scale).contains(&scale),
                    "scale {} out of range",
                    scale
                ),
            }
        }
    }

    #[test]
    fn prop_step_is_pure(kind in scene_kind(), audio in audio_frame(), dt in 0.0f32..0.1) {
        let settings = RenderSettings::default();
        let state = SceneState::new(kind, &settings);
        let before = state.clone();
        let input = FrameInput {
            audio: &audio,
            settings: &settings,
        };
        let a = step(&state, &input, dt);
        let b = step(&state, &input, dt);
        prop_assert_eq!(state, before);
        prop_assert_eq!(a, b);
    }
}
