pub mod external_program;
pub mod transcription_program;
