use anyhow::Result;

fn main() -> Result<()> {
    terminal_secrets::app::run()
}
