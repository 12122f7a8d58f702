use anyhow::Result;

fn main() -> Result<()> {
    xbridge::cli::run()
}
