use crate::movie::domain::movie_encoder::EncoderError;

/// Parsed form of a movie option string such as
/// `":CodecType=libx264 Bitrate=4000 Keyframe=30 preset=fast"`.
///
/// Tokens are whitespace separated `Key=Value` pairs, optionally prefixed
/// with `:`. Keys are case-insensitive. Anything that is not a known key
/// is forwarded to the codec as a private option.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    pub codec: Option<String>,
    pub bitrate_kbps: Option<usize>,
    pub keyframe_interval: Option<u32>,
    pub codec_private: Vec<(String, String)>,
}

impl EncoderOptions {
    pub fn parse(options: &str) -> Result<Self, EncoderError> {
        let mut parsed = Self::default();

        for token in options.split_whitespace() {
            let token = token.trim_start_matches(':');
            if token.is_empty() {
                continue;
            }
            let (key, value) = token
                .split_once('=')
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| EncoderError::InvalidOption(token.to_string()))?;

            match key.to_ascii_lowercase().as_str() {
                "codectype" | "codec" => parsed.codec = Some(value.to_string()),
                "bitrate" => parsed.bitrate_kbps = Some(parse_number(token, value)?),
                "keyframe" => {
                    let interval: u32 = parse_number(token, value)?;
                    if interval == 0 {
                        return Err(EncoderError::InvalidOption(token.to_string()));
                    }
                    parsed.keyframe_interval = Some(interval);
                }
                _ => parsed
                    .codec_private
                    .push((key.to_string(), value.to_string())),
            }
        }

        Ok(parsed)
    }
}

fn parse_number<T: std::str::FromStr>(token: &str, value: &str) -> Result<T, EncoderError> {
    value
        .parse()
        .map_err(|_| EncoderError::InvalidOption(token.to_string()))
}
