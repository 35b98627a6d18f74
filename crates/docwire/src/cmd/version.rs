use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("docwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: docwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("DOCWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: channel={}, async={}, cli=true",
        cfg!(feature = "channel"),
        cfg!(feature = "async")
    );
    println!(
        "protocol: {} {}",
        docwire_channel::DEFAULT_PROTOCOL,
        docwire_channel::DEFAULT_PROTOCOL_VERSION
    );

    Ok(SUCCESS)
}
