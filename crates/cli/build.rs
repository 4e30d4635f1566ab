use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("marginalia")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Augment rendered static-site pages")
        .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format (html, json)")
                .value_name("FORMAT")
                .default_value("html")
                .value_parser(["html", "json"]),
        )
        .arg(
            clap::arg!(--config <FILE> "Configuration file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--container <SELECTOR> "Selector for the content container"))
        .arg(clap::arg!(--wpm <NUM> "Reading speed in words per minute"))
        .arg(clap::arg!(--"no-metadata" "Leave metadata targets untouched"))
        .arg(clap::arg!(--"api-base" <URL> "Metadata API root"))
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds"))
        .arg(clap::arg!(--placeholder <TEXT> "Text shown when a metadata lookup fails"))
        .arg(clap::arg!(--token <TOKEN> "API token (default: $GITHUB_TOKEN)"))
        .arg(clap::arg!(--"user-agent" <UA> "Custom User-Agent for fetching the page").value_name("UA"))
        .arg(clap::arg!(--"scroll-offset" <PX> "Render scroll-threshold classes as if scrolled to this offset"))
        .arg(
            clap::arg!(--open <ID> "Open the toggle controlling this element id")
                .action(clap::ArgAction::Append),
        )
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "marginalia", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "marginalia", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "marginalia", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "marginalia", &completions_dir).unwrap();
}
