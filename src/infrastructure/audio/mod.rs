mod chunker;
mod normalizer;

pub use chunker::{parse_silence_log, plan_boundaries, FfmpegChunker, SilenceInterval};
pub use normalizer::{
    check_ffmpeg_binary, is_supported_extension, is_video_extension, wav_duration_seconds,
    FfmpegNormalizer, SAMPLE_RATE,
};
