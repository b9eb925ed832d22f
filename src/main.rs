mod cli;
mod config;
mod counter;
mod geometry;
mod ipc;
mod logging;
mod pose;
mod session;
mod tracker;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
