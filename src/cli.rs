//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download a video's best audio and video streams and stitch them together.
///
/// When SOURCE is an existing local file, a subclip between --start and
/// --end is cut from it instead.
#[derive(Parser, Debug)]
#[command(name = "vidstitch")]
#[command(author, version, about)]
pub struct Args {
    /// Source URL, or a local video file to cut a subclip from
    pub source: String,

    /// Subclip start, in seconds [default: 0]
    #[arg(short, long, requires = "end")]
    pub start: Option<u64>,

    /// Subclip end, in seconds
    #[arg(short, long)]
    pub end: Option<u64>,

    /// Download only the best audio track (written as .wav)
    #[arg(short, long)]
    pub audio_only: bool,

    /// Download only the best video track
    #[arg(short, long, conflicts_with = "audio_only")]
    pub video_only: bool,

    /// Replace an existing output file and its metadata record
    #[arg(long)]
    pub overwrite: bool,

    /// Directory for finished files [default: downloads]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Parent directory for per-run staging directories [default: temp]
    #[arg(long)]
    pub staging_root: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/vidstitch/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (--verbose for debug, twice for trace)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["vidstitch", "https://youtu.be/abc"]).unwrap();
        assert_eq!(args.source, "https://youtu.be/abc");
        assert_eq!(args.start, None);
        assert_eq!(args.end, None);
        assert!(!args.audio_only);
        assert!(!args.video_only);
        assert!(!args.overwrite);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_source_is_required() {
        let err = Args::try_parse_from(["vidstitch"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_short_flags() {
        let args =
            Args::try_parse_from(["vidstitch", "u", "-s", "10", "-e", "25", "-v", "-o", "out"])
                .unwrap();
        assert_eq!(args.start, Some(10));
        assert_eq!(args.end, Some(25));
        assert!(args.video_only);
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_cli_start_requires_end() {
        let err = Args::try_parse_from(["vidstitch", "u", "-s", "10"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );

        let args = Args::try_parse_from(["vidstitch", "u", "-e", "5"]).unwrap();
        assert_eq!(args.start, None);
        assert_eq!(args.end, Some(5));
    }

    #[test]
    fn test_cli_audio_and_video_only_conflict() {
        let err = Args::try_parse_from(["vidstitch", "u", "-a", "-v"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_verbose_is_long_only_and_counts() {
        let args = Args::try_parse_from(["vidstitch", "u", "--verbose", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(!args.video_only);
    }

    #[test]
    fn test_cli_negative_offsets_rejected() {
        assert!(Args::try_parse_from(["vidstitch", "u", "-s", "-3"]).is_err());
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["vidstitch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
