mod tests {
    use myrtio_sketch_sim::math8::{clamp8, clamp8_f64, scale_by_brightness};

    #[test]
    fn test_scale_by_brightness() {
        assert_eq!(scale_by_brightness(255, 255), 255);
        assert_eq!(scale_by_brightness(255, 128), 128);
        assert_eq!(scale_by_brightness(128, 128), 64);
        assert_eq!(scale_by_brightness(100, 50), 19);
        assert_eq!(scale_by_brightness(255, 0), 0);
    }

    #[test]
    fn test_clamp8() {
        assert_eq!(clamp8(-20), 0);
        assert_eq!(clamp8(42), 42);
        assert_eq!(clamp8(300), 255);
    }

    #[test]
    fn test_clamp8_f64() {
        assert_eq!(clamp8_f64(12.9), 12);
        assert_eq!(clamp8_f64(-0.5), 0);
        assert_eq!(clamp8_f64(1e9), 255);
        assert_eq!(clamp8_f64(f64::NAN), 0);
    }
}
