mod tests {
    use myrtio_sketch_sim::color::{Color, pack};
    use myrtio_sketch_sim::{ColorOrder, Rgb, Strip, StripError};

    const WHITE: u32 = 0x00FF_FFFF;

    fn strip(count: usize) -> Strip {
        Strip::new(count, 6, ColorOrder::Grb).unwrap()
    }

    #[test]
    fn test_new_strip_is_black_at_full_brightness() {
        let strip = strip(5);
        assert_eq!(strip.pixel_count(), 5);
        assert_eq!(strip.brightness(), 255);
        assert!(strip.pixels().iter().all(|px| *px == Color::default()));
    }

    #[test]
    fn test_zero_pixels_rejected() {
        assert!(matches!(
            Strip::new(0, 6, ColorOrder::Grb),
            Err(StripError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_out_of_range_index_leaves_buffer_untouched() {
        let mut strip = strip(3);
        strip.set_pixel_color(1, Color::rgb(1, 2, 3)).unwrap();
        let before = strip.pixels().to_vec();

        assert_eq!(
            strip.set_pixel_color(3, Color::rgb(9, 9, 9)),
            Err(StripError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            strip.set_pixel_color(-1, Color::rgb(9, 9, 9)),
            Err(StripError::IndexOutOfRange { index: -1, len: 3 })
        );
        assert!(strip.pixel_color(7).is_err());
        assert_eq!(strip.pixels(), before.as_slice());
    }

    #[test]
    fn test_fill_defaults_to_the_end() {
        let mut strip = strip(6);
        strip.fill(WHITE, 2, 0).unwrap();
        assert_eq!(strip.pixel_color(1), Ok(0));
        assert_eq!(strip.pixel_color(2), Ok(WHITE));
        assert_eq!(strip.pixel_color(5), Ok(WHITE));
    }

    #[test]
    fn test_fill_checks_the_whole_range_first() {
        let mut strip = strip(4);
        assert!(strip.fill(WHITE, 2, 3).is_err());
        assert!(strip.pixels().iter().all(|px| *px == Color::default()));
        assert!(matches!(
            strip.fill(WHITE, 0, -1),
            Err(StripError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clear() {
        let mut strip = strip(4);
        strip.fill(WHITE, 0, 0).unwrap();
        strip.clear();
        assert!(strip.pixels().iter().all(|px| px.packed() == 0));
    }

    #[test]
    fn test_brightness_scales_frame_only() {
        let mut strip = strip(2);
        strip.set_pixel_color(0, Color::new(200, 100, 50, 10)).unwrap();
        strip.set_brightness(128);

        assert_eq!(strip.pixel_color(0), Ok(pack(200, 100, 50, 10)));
        assert_eq!(
            strip.frame()[0],
            Rgb {
                r: 100,
                g: 50,
                b: 25
            }
        );
    }

    #[test]
    fn test_color_order_parsing() {
        assert_eq!("GRB".parse::<ColorOrder>(), Ok(ColorOrder::Grb));
        assert_eq!("RGBW".parse::<ColorOrder>(), Ok(ColorOrder::Rgbw));
        assert!("XYZ".parse::<ColorOrder>().is_err());
        for order in ColorOrder::ALL {
            assert_eq!(order.as_str().parse::<ColorOrder>(), Ok(order));
        }
    }
}
