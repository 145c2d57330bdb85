use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "gpt2",
    author,
    version,
    about = "Run inference for a GPT-2 model to standard output.",
    disable_version_flag = true
)]
pub struct Args {
    /// Where to load the model from.
    #[arg(long, short = 'm', default_value = "gpt2_124M.bin")]
    pub model_path: PathBuf,

    /// Where to load the tokenizer decoding table from.
    ///
    /// If the file cannot be read, generation continues and token ids
    /// are printed as decimal numbers instead of decoded bytes.
    #[arg(long, short = 'd', default_value = "gpt2_tokenizer.bin")]
    pub decoder_path: PathBuf,

    /// Sets how many tokens to generate. -1 generates until interrupted.
    ///
    /// The number of generated tokens can be larger than the model's
    /// maximum sequence length; the oldest tokens are dropped from the
    /// context as new ones are added at the end.
    #[arg(long, short = 'n', default_value_t = -1, allow_hyphen_values = true)]
    pub num_tokens: i64,

    /// Limits the working sequence length.
    ///
    /// Values above the model's maximum sequence length are clamped.
    #[arg(long, short = 'l')]
    pub seq_len: Option<usize>,

    /// Extends the token buffer between 1.0 and 3.0 times the working
    /// sequence length, trading memory for fewer compactions.
    #[arg(long, short = 'r', default_value_t = 2.0)]
    pub oversize_ratio: f32,

    /// Specifies the seed to use during sampling.
    #[arg(long, short = 's', default_value_t = 1337)]
    pub seed: u64,

    /// Print version information.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}
