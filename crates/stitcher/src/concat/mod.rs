//! Concatenation tooling

pub mod ffmpeg;

pub use ffmpeg::{
    build_concat_command, encode_list_name, list_file_path, quote_concat_path,
    render_concat_list, resolve_tool, run_concat, write_concat_list, ConcatError, ConcatParams,
};
