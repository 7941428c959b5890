use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "finsight")]
#[command(about = "Semantic query cache for financial analysis responses.")]
#[command(version)]
pub struct Cli {
    /// Intent bucket the query belongs to
    #[arg(short = 'i', long, default_value = "general_query")]
    pub intent: String,

    /// Store this JSON response for the query
    #[arg(long, value_name = "JSON")]
    pub put: Option<String>,

    /// Show normalized text, entities and semantic key of the query
    #[arg(short = 'e', long)]
    pub explain: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show cache statistics
    #[arg(long)]
    pub status: bool,

    /// Delete query cache entries older than HOURS
    #[arg(long, value_name = "HOURS")]
    pub clear: Option<u32>,

    /// Delete video cache entries older than HOURS
    #[arg(long, value_name = "HOURS")]
    pub clear_videos: Option<u32>,

    /// Delete every expired entry
    #[arg(long)]
    pub purge: bool,

    /// Search cached videos by title, channel or transcript
    #[arg(long, value_name = "TEXT")]
    pub search_videos: Option<String>,

    /// Generate config sample
    #[arg(long)]
    pub generate_config: bool,

    /// Query text
    #[arg(num_args = 1..)]
    pub query: Vec<String>,
}
