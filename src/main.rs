use clap::Parser as ClapParser;
use dawet::context::CompileContext;
use dawet::driver;
use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;
use target_lexicon::Triple;

/// C11 declaration parser and type system front-end.
#[derive(ClapParser, Debug)]
#[clap(name = "dawet", version)]
struct Cli {
    /// Input C source file
    input_file: PathBuf,

    /// Print every root declaration as `name: type`
    #[clap(long)]
    dump_decls: bool,

    /// Target triple (defaults to the host)
    #[clap(long, value_name = "TRIPLE")]
    target: Option<String>,

    /// Treat plain `char` as unsigned
    #[clap(long)]
    funsigned_char: bool,

    /// Warning controls (`-W error`, `-W no-warnings`)
    #[clap(short = 'W', action = clap::ArgAction::Append)]
    warnings: Vec<String>,

    /// Disable colored diagnostics
    #[clap(long)]
    no_color: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let target = match &cli.target {
        Some(triple) => match Triple::from_str(triple) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("dawet: invalid target '{}': {}", triple, e);
                exit(2);
            }
        },
        None => Triple::host(),
    };
    let mut ctx = CompileContext::new(target);
    ctx.char_is_signed = !cli.funsigned_char;

    let compilation = match driver::compile_file(&cli.input_file, &ctx, &cli.warnings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("dawet: cannot read '{}': {}", cli.input_file.display(), e);
            exit(2);
        }
    };

    compilation.print_diagnostics(!cli.no_color);
    if cli.dump_decls {
        print!("{}", compilation.dump_decls());
    }

    if compilation.diag.has_errors() {
        exit(1);
    }
}
