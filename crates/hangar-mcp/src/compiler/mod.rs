//! Launch spec compilation: proxy command and base image selection.
//!
//! Every tool server is wrapped by an SSE proxy that listens on the port the
//! function's container config exposes and forwards the environment to the
//! stdio child process.

pub mod images;

pub use images::RuntimeImages;

use crate::error::CompileError;
use crate::model::{LaunchSpec, ProxyCommand};

/// Fixed invocation prefix placed before the server's own command.
pub const PROXY_PREFIX: [&str; 9] = [
    "mcp-proxy",
    "--sse-port",
    "8080",
    "--sse-host",
    "0.0.0.0",
    "--allow-origin",
    "*",
    "--pass-environment",
    "--",
];

/// Compile a launch spec into the proxy command: prefix, command, args.
pub fn compile(spec: &LaunchSpec) -> ProxyCommand {
    let mut tokens = Vec::with_capacity(PROXY_PREFIX.len() + 1 + spec.args.len());
    tokens.extend(PROXY_PREFIX.iter().map(|t| t.to_string()));
    tokens.push(spec.command.clone());
    tokens.extend(spec.args.iter().cloned());
    ProxyCommand::from_tokens(tokens)
}

/// Resolve the base image for a command name against `images`.
pub fn resolve_image<'a>(images: &'a RuntimeImages, command: &str) -> Result<&'a str, CompileError> {
    images.resolve(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fetch_server_example() {
        let spec = LaunchSpec::new("uvx", vec!["mcp-server-fetch".to_string()]);
        let cmd = compile(&spec);
        assert_eq!(
            cmd.tokens(),
            [
                "mcp-proxy",
                "--sse-port",
                "8080",
                "--sse-host",
                "0.0.0.0",
                "--allow-origin",
                "*",
                "--pass-environment",
                "--",
                "uvx",
                "mcp-server-fetch",
            ]
        );
        let images = RuntimeImages::default();
        assert_eq!(resolve_image(&images, &spec.command).unwrap(), images::PYTHON_IMAGE);
    }

    #[test]
    fn env_does_not_affect_command() {
        let mut spec = LaunchSpec::new("npx", vec!["-y".into(), "pkg".into()]);
        let before = compile(&spec);
        spec.env.insert("API_KEY".into(), "secret".into());
        assert_eq!(compile(&spec), before);
    }

    proptest! {
        #[test]
        fn compile_is_prefix_then_command_then_args(
            command in "[a-z][a-z0-9_-]{0,12}",
            args in proptest::collection::vec(".{0,16}", 0..6),
        ) {
            let spec = LaunchSpec::new(command.clone(), args.clone());
            let first = compile(&spec);
            prop_assert_eq!(&first, &compile(&spec));

            let prefix: Vec<String> = PROXY_PREFIX.iter().map(|t| t.to_string()).collect();
            let tokens = first.tokens();
            prop_assert_eq!(tokens.len(), PROXY_PREFIX.len() + 1 + args.len());
            prop_assert_eq!(&tokens[..PROXY_PREFIX.len()], &prefix[..]);
            prop_assert_eq!(&tokens[PROXY_PREFIX.len()], &command);
            prop_assert_eq!(&tokens[PROXY_PREFIX.len() + 1..], &args[..]);
        }
    }
}
