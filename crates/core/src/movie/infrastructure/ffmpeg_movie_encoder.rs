use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::Rational;

use crate::movie::domain::movie_encoder::{EncoderError, MovieEncoder};
use crate::movie::infrastructure::encoder_options::EncoderOptions;
use crate::shared::constants::FRAME_CHANNELS;
use crate::shared::frame::Frame;
use crate::shared::movie_params::MovieParams;

/// Encodes BGRA staging frames via ffmpeg-next.
///
/// The container is chosen from the file extension. The codec defaults to
/// MPEG-4 Part 2 and can be overridden with `CodecType=` in the movie
/// options. Timestamps count movie frame intervals, so a frame added with
/// a duration of 3 holds the picture for three intervals.
pub struct FfmpegMovieEncoder {
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    time_base: Rational,
    next_pts: i64,
    stream_index: usize,
}

// Safety: FfmpegMovieEncoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegMovieEncoder {}

impl FfmpegMovieEncoder {
    pub fn new() -> Self {
        Self {
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            time_base: Rational::new(1, 30),
            next_pts: 0,
            stream_index: 0,
        }
    }

    fn drain(
        encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
        octx: &mut ffmpeg_next::format::context::Output,
        stream_index: usize,
        time_base: Rational,
    ) -> Result<(), EncoderError> {
        let ost_time_base = octx
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or(EncoderError::NotOpened)?;

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(stream_index);
            encoded.rescale_ts(time_base, ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        Ok(())
    }

    /// Adds the video stream, opens the codec and writes the container header.
    fn configure(
        octx: &mut ffmpeg_next::format::context::Output,
        codec: ffmpeg_next::Codec,
        params: &MovieParams,
        options: &EncoderOptions,
    ) -> Result<
        (
            ffmpeg_next::codec::encoder::video::Encoder,
            ffmpeg_next::software::scaling::Context,
            usize,
            Rational,
        ),
        EncoderError,
    > {
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let mut ost = octx.add_stream(Some(codec))?;
        let stream_index = ost.index();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let frame_rate = frame_rate_rational(params.framerate);
        let time_base = frame_rate.invert();

        encoder_ctx.set_width(params.width);
        encoder_ctx.set_height(params.height);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(frame_rate));

        if let Some(kbps) = options.bitrate_kbps {
            encoder_ctx.set_bit_rate(kbps * 1000);
        }
        if let Some(gop) = options.keyframe_interval {
            encoder_ctx.set_gop(gop);
        }
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut codec_options = ffmpeg_next::Dictionary::new();
        for (key, value) in &options.codec_private {
            codec_options.set(key, value);
        }

        let encoder = encoder_ctx.open_with(codec_options)?;
        ost.set_parameters(&encoder);

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            Pixel::BGRA,
            params.width,
            params.height,
            Pixel::YUV420P,
            params.width,
            params.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok((encoder, scaler, stream_index, time_base))
    }
}

impl Default for FfmpegMovieEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest numerator or denominator MPEG-4 accepts in a time base.
const MAX_TIME_BASE_TERM: i64 = 65535;

/// Encoder frame rate for a possibly fractional `fps`.
///
/// Whole rates map to `n/1`. The NTSC family (23.976, 29.97, 59.94) lands on
/// `n*1000/1001` while that fits a 16-bit time base; everything else gets the
/// closest fraction with both terms at most 65535, so 12.5 is `25/2` and
/// 119.88 is `2997/25`.
pub fn frame_rate_rational(fps: f64) -> Rational {
    let rounded = fps.round();
    if rounded >= 1.0 && (fps - rounded).abs() < 1e-3 {
        let whole = (rounded as i64).min(MAX_TIME_BASE_TERM);
        return Rational::new(whole as i32, 1);
    }

    let ntsc = (fps * 1.001).round();
    if ntsc >= 1.0
        && (fps - ntsc / 1.001).abs() < 1e-3
        && ntsc as i64 * 1000 <= MAX_TIME_BASE_TERM
    {
        return Rational::new(ntsc as i32 * 1000, 1001);
    }

    let (num, den) = bounded_fraction(fps, MAX_TIME_BASE_TERM);
    Rational::new(num as i32, den as i32)
}

/// Last continued-fraction convergent of `value` whose terms stay within `max`.
fn bounded_fraction(value: f64, max: i64) -> (i64, i64) {
    // (p0, q0) and (p1, q1) are the two previous convergents
    let (mut p0, mut q0, mut p1, mut q1) = (0i64, 1i64, 1i64, 0i64);
    let mut x = value;
    loop {
        let a = x.floor();
        if a > max as f64 {
            break;
        }
        let a = a as i64;
        let (p2, q2) = (a * p1 + p0, a * q1 + q0);
        if p2 > max || q2 > max {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p2, q2);

        let frac = x - a as f64;
        if frac < 1e-9 || (p1 as f64 / q1 as f64 - value).abs() <= 1e-9 * value {
            break;
        }
        x = 1.0 / frac;
    }

    match (p1, q1) {
        (_, 0) => (max, 1),
        (0, _) => (1, max),
        fraction => fraction,
    }
}

impl MovieEncoder for FfmpegMovieEncoder {
    fn open(&mut self, path: &Path, params: &MovieParams) -> Result<(), EncoderError> {
        ffmpeg_next::init()?;

        let options = EncoderOptions::parse(&params.options)?;
        let codec = match &options.codec {
            Some(name) => ffmpeg_next::encoder::find_by_name(name)
                .ok_or_else(|| EncoderError::CodecNotFound(name.clone()))?,
            None => ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
                .ok_or_else(|| EncoderError::CodecNotFound("mpeg4".to_string()))?,
        };

        let mut octx = ffmpeg_next::format::output(path)?;

        let (encoder, scaler, stream_index, time_base) =
            match Self::configure(&mut octx, codec, params, &options) {
                Ok(configured) => configured,
                Err(e) => {
                    // the muxer already created the file; don't leave it behind
                    drop(octx);
                    if let Err(rm) = std::fs::remove_file(path) {
                        log::debug!("Could not remove {}: {rm}", path.display());
                    }
                    return Err(e);
                }
            };

        log::debug!(
            "Opened {} encoder for {} (time base {time_base})",
            codec.name(),
            path.display()
        );

        self.width = params.width;
        self.height = params.height;
        self.time_base = time_base;
        self.next_pts = 0;
        self.stream_index = stream_index;
        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);

        Ok(())
    }

    fn append(
        &mut self,
        frame: &Frame,
        duration_units: u32,
        upside_down: bool,
    ) -> Result<(), EncoderError> {
        let (Some(encoder), Some(scaler), Some(octx)) = (
            self.encoder.as_mut(),
            self.scaler.as_mut(),
            self.octx.as_mut(),
        ) else {
            return Err(EncoderError::NotOpened);
        };

        if frame.width() != self.width
            || frame.height() != self.height
            || frame.channels() != FRAME_CHANNELS
        {
            return Err(EncoderError::DimensionMismatch {
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let mut bgra_frame =
            ffmpeg_next::util::frame::video::Video::new(Pixel::BGRA, self.width, self.height);

        let stride = bgra_frame.stride(0);
        let row_len = frame.row_len();
        let height = self.height as usize;
        let src = frame.data();
        let dst = bgra_frame.data_mut(0);

        // Copy row by row, respecting stride; bottom-up buffers are flipped here
        for row in 0..height {
            let src_row = if upside_down { height - 1 - row } else { row };
            let src_start = src_row * row_len;
            let dst_start = row * stride;
            dst[dst_start..dst_start + row_len]
                .copy_from_slice(&src[src_start..src_start + row_len]);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&bgra_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.next_pts));

        encoder.send_frame(&yuv_frame)?;
        self.next_pts += i64::from(duration_units);

        Self::drain(encoder, octx, self.stream_index, self.time_base)
    }

    fn close(&mut self) -> Result<(), EncoderError> {
        self.scaler = None;

        if let (Some(mut encoder), Some(mut octx)) = (self.encoder.take(), self.octx.take()) {
            encoder.send_eof()?;
            Self::drain(&mut encoder, &mut octx, self.stream_index, self.time_base)?;
            octx.write_trailer()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn params(w: u32, h: u32, fps: f64) -> MovieParams {
        MovieParams::new(w, h, fps)
    }

    fn solid_frame(w: u32, h: u32, value: u8) -> Frame {
        Frame::new(vec![value; (w * h * 4) as usize], w, h, 4, 0)
    }

    /// Top half white, bottom half black.
    fn split_frame(w: u32, h: u32) -> Frame {
        let mut frame = solid_frame(w, h, 0);
        let half = frame.row_len() * (h as usize / 2);
        frame.data_mut()[..half].fill(255);
        frame
    }

    /// Average luma of the first and last row of the first decoded frame.
    fn first_frame_edge_luma(path: &Path) -> (f64, f64) {
        ffmpeg_next::init().unwrap();
        let mut ictx = ffmpeg_next::format::input(path).unwrap();
        let (index, mut decoder) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .unwrap();
            let ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .unwrap();
            (stream.index(), ctx.decoder().video().unwrap())
        };

        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        let mut got_frame = false;
        for (stream, packet) in ictx.packets() {
            if stream.index() != index {
                continue;
            }
            decoder.send_packet(&packet).unwrap();
            if decoder.receive_frame(&mut decoded).is_ok() {
                got_frame = true;
                break;
            }
        }
        if !got_frame {
            decoder.send_eof().unwrap();
            decoder.receive_frame(&mut decoded).unwrap();
        }

        let width = decoded.width() as usize;
        let height = decoded.height() as usize;
        let stride = decoded.stride(0);
        let luma = decoded.data(0);
        let row_avg = |row: usize| {
            let start = row * stride;
            luma[start..start + width].iter().map(|&b| b as f64).sum::<f64>() / width as f64
        };
        (row_avg(0), row_avg(height - 1))
    }

    #[rstest]
    #[case::integral(30.0, 30, 1)]
    #[case::low(1.0, 1, 1)]
    #[case::ntsc(29.97, 30000, 1001)]
    #[case::film(23.976, 24000, 1001)]
    #[case::double_ntsc(59.94, 60000, 1001)]
    #[case::pal_half(12.5, 25, 2)]
    #[case::half_step(75.5, 151, 2)]
    #[case::display_120hz(119.88, 2997, 25)]
    #[case::sub_one(0.5, 1, 2)]
    fn test_frame_rate_rational(#[case] fps: f64, #[case] num: i32, #[case] den: i32) {
        let rate = frame_rate_rational(fps);
        assert_eq!(rate.numerator(), num);
        assert_eq!(rate.denominator(), den);
    }

    #[rstest]
    #[case(29.97)]
    #[case(119.88)]
    #[case(143.856)]
    #[case(0.3)]
    #[case(1e-6)]
    #[case(100_000.0)]
    fn test_frame_rate_rational_fits_mpeg4_time_base(#[case] fps: f64) {
        let rate = frame_rate_rational(fps);
        assert!(rate.numerator() >= 1 && rate.numerator() <= 65535);
        assert!(rate.denominator() >= 1 && rate.denominator() <= 65535);
        if (0.1..10_000.0).contains(&fps) {
            assert_relative_eq!(
                rate.numerator() as f64 / rate.denominator() as f64,
                fps,
                max_relative = 1e-4
            );
        }
    }

    #[test]
    fn test_write_at_120hz_display_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        encoder.open(&path, &params(64, 48, 119.88)).unwrap();
        for _ in 0..4 {
            encoder.append(&solid_frame(64, 48, 90), 1, false).unwrap();
        }
        encoder.close().unwrap();

        let mut ictx = ffmpeg_next::format::input(&path).unwrap();
        let index = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .unwrap()
            .index();
        let packets = ictx.packets().filter(|(s, _)| s.index() == index).count();
        assert_eq!(packets, 4);
    }

    #[test]
    fn test_failed_codec_open_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        // png cannot encode yuv420p, so the codec open fails after the muxer made the file
        let mut encoder = FfmpegMovieEncoder::new();
        let p = params(64, 48, 30.0).with_options("CodecType=png");
        assert!(matches!(
            encoder.open(&path, &p),
            Err(EncoderError::Ffmpeg(_))
        ));
        assert!(!path.exists());
        assert!(matches!(
            encoder.append(&solid_frame(64, 48, 0), 1, false),
            Err(EncoderError::NotOpened)
        ));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        encoder.open(&path, &params(160, 120, 30.0)).unwrap();
        for _ in 0..3 {
            encoder.append(&solid_frame(160, 120, 128), 1, false).unwrap();
        }
        encoder.close().unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_written_movie_has_correct_resolution_and_packets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        encoder.open(&path, &params(160, 120, 30.0)).unwrap();
        for _ in 0..3 {
            encoder.append(&solid_frame(160, 120, 64), 2, false).unwrap();
        }
        encoder.close().unwrap();

        let mut ictx = ffmpeg_next::format::input(&path).unwrap();
        let index = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .unwrap();
            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                    .unwrap();
            let decoder = codec_ctx.decoder().video().unwrap();
            assert_eq!(decoder.width(), 160);
            assert_eq!(decoder.height(), 120);
            stream.index()
        };
        let packets = ictx.packets().filter(|(s, _)| s.index() == index).count();
        assert_eq!(packets, 3);
    }

    #[test]
    fn test_upside_down_frames_are_flipped() {
        let dir = tempfile::tempdir().unwrap();
        let upright = dir.path().join("upright.mp4");
        let flipped = dir.path().join("flipped.mp4");

        for (path, upside_down) in [(&upright, false), (&flipped, true)] {
            let mut encoder = FfmpegMovieEncoder::new();
            encoder.open(path, &params(64, 64, 30.0)).unwrap();
            encoder.append(&split_frame(64, 64), 1, upside_down).unwrap();
            encoder.close().unwrap();
        }

        let (top, bottom) = first_frame_edge_luma(&upright);
        assert!(top > bottom + 100.0, "upright: top {top}, bottom {bottom}");

        let (top, bottom) = first_frame_edge_luma(&flipped);
        assert!(bottom > top + 100.0, "flipped: top {top}, bottom {bottom}");
    }

    #[test]
    fn test_codec_option_selects_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");

        let mut encoder = FfmpegMovieEncoder::new();
        let p = params(96, 64, 25.0).with_options(":CodecType=mpeg4 Bitrate=500 Keyframe=10");
        encoder.open(&path, &p).unwrap();
        encoder.append(&solid_frame(96, 64, 200), 1, false).unwrap();
        encoder.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unknown_codec_fails_without_creating_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        let p = params(96, 64, 25.0).with_options("CodecType=no-such-codec");
        assert!(matches!(
            encoder.open(&path, &p),
            Err(EncoderError::CodecNotFound(name)) if name == "no-such-codec"
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_options_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        let p = params(96, 64, 25.0).with_options("Bitrate");
        assert!(matches!(
            encoder.open(&path, &p),
            Err(EncoderError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        encoder.open(&path, &params(160, 120, 30.0)).unwrap();
        let result = encoder.append(&solid_frame(80, 60, 0), 1, false);
        assert!(matches!(
            result,
            Err(EncoderError::DimensionMismatch {
                width: 160,
                height: 120,
                actual_width: 80,
                actual_height: 60,
            })
        ));
        encoder.close().unwrap();
    }

    #[test]
    fn test_append_without_open_returns_error() {
        let mut encoder = FfmpegMovieEncoder::new();
        let result = encoder.append(&solid_frame(160, 120, 128), 1, false);
        assert!(matches!(result, Err(EncoderError::NotOpened)));
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut encoder = FfmpegMovieEncoder::new();
        encoder.open(&path, &params(160, 120, 30.0)).unwrap();
        encoder.append(&solid_frame(160, 120, 128), 1, false).unwrap();
        encoder.close().unwrap();
        assert!(encoder.close().is_ok());
        assert!(matches!(
            encoder.append(&solid_frame(160, 120, 128), 1, false),
            Err(EncoderError::NotOpened)
        ));
    }
}
