use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cfg = virtual_webauthn::config::Config::parse();
    virtual_webauthn::run(cfg)
}
