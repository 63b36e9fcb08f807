use std::{
    fs::File,
    io::{Read, Write},
    os::fd::{AsRawFd, FromRawFd},
    path::PathBuf,
};

use anyhow::{Context, Result};
use nix::unistd::{dup, dup2};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::NetboxApi;
use crate::client::NetboxClient;
use crate::config::ModuleArgs;
use crate::logging;
use crate::reconcile::{ModuleResult, Reconciler};
use crate::resource::ResourceType;

/// How the executable was invoked.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Read the module arguments from this file instead of stdin.
    pub args_file: Option<PathBuf>,
    /// Force check mode, regardless of the arguments document.
    pub check: bool,
    pub verbose: bool,
}

/// Run one module invocation and exit.
///
/// The result document is the only thing written to the original stdout;
/// logs and any stray output go to stderr.
pub fn run_main<R: ResourceType>(options: Options) -> ! {
    let mut pipe = {
        let pipe = init_stdio().unwrap_or_exit();
        pipe_fds_to_files(pipe)
    };

    logging::set_up(options.verbose).unwrap_or_exit();

    let outcome = read_input(&options, &mut pipe.in_).and_then(|input| {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Could not start the async runtime")?;
        runtime.block_on(execute::<R>(&input, options.check))
    });

    let (document, code) = result_document(outcome);

    serde_json::to_writer(&mut pipe.out, &document)
        .context("Could not write result document")
        .unwrap_or_exit();
    pipe.out
        .write_all(b"\n")
        .and_then(|()| pipe.out.flush())
        .context("Could not write result document")
        .unwrap_or_exit();
    std::process::exit(code)
}

/// Parse the arguments document and reconcile against the NetBox it names.
pub async fn execute<R: ResourceType>(input: &str, check: bool) -> Result<ModuleResult> {
    let args = parse_args::<R>(input)?;
    let connection = args
        .connection
        .clone()
        .resolve()
        .context("Invalid connection options")?;
    let client = NetboxClient::new(&connection)?;
    apply::<R, _>(&client, args, check).await
}

/// Reconcile already parsed arguments through `api`.
pub async fn apply<R: ResourceType, A: NetboxApi + ?Sized>(
    api: &A,
    args: ModuleArgs<R::Data>,
    check: bool,
) -> Result<ModuleResult> {
    let result = Reconciler::new(api, check || args.check_mode)
        .reconcile::<R>(args.state, &args.data, args.query_params.as_deref())
        .await?;
    Ok(result)
}

pub fn parse_args<R: ResourceType>(input: &str) -> Result<ModuleArgs<R::Data>> {
    serde_json::from_str(input)
        .with_context(|| format!("Could not parse module arguments for {}", R::NAME))
}

/// The document to print for an invocation, and the exit code to go with it.
fn result_document<T: Serialize>(outcome: Result<T>) -> (Value, i32) {
    let error = match outcome {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(document) => return (document, 0),
            Err(e) => anyhow::Error::from(e).context("Could not serialize result document"),
        },
        Err(e) => e,
    };
    tracing::error!("{:#}", error);
    (failure_document(&error), 1)
}

/// The document reported when a module fails.
pub fn failure_document(error: &anyhow::Error) -> Value {
    json!({
        "failed": true,
        "msg": format!("{:#}", error),
    })
}

fn read_input(options: &Options, stdin: &mut File) -> Result<String> {
    let mut input = String::new();
    match &options.args_file {
        Some(path) => {
            input = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read arguments file {}", path.display()))?;
        }
        None => {
            stdin
                .read_to_string(&mut input)
                .context("Could not read module arguments from stdin")?;
        }
    }
    Ok(input)
}

/// A pair of `T` values: one for input and one for output.
struct InOut<T> {
    in_: T,
    out: T,
}

/// A file descriptor
type Fd = i32;

/// Configure the standard input/output streams for the process.
/// This returns the original stdin and stdout, and reconfigures the stdio
/// file descriptors as follows:
///
/// ```text
/// 0: /dev/null
/// 1: stderr
/// 2: stderr
/// ```
fn init_stdio() -> Result<InOut<Fd>> {
    let r = InOut {
        in_: dup(0).context("dup(0)")?,
        out: dup(1).context("dup(1)")?,
    };

    // 0: dev/null
    {
        let dev_null = File::open("/dev/null").context("Could not open /dev/null")?;
        dup2(dev_null.as_raw_fd(), 0).context("Could not dup2(/dev/null, 0)")?;
    }

    // 1: stderr
    dup2(2, 1).context("Could not dup2(2, 1)")?;

    // 2: stderr is left as is

    Ok(r)
}

fn pipe_fds_to_files(pipe: InOut<Fd>) -> InOut<File> {
    // Both descriptors were just created by dup and are owned by nobody else
    InOut {
        in_: unsafe { File::from_raw_fd(pipe.in_) },
        out: unsafe { File::from_raw_fd(pipe.out) },
    }
}

trait UnwrapOrExit<T> {
    fn unwrap_or_exit(self) -> T;
}
impl<T> UnwrapOrExit<T> for Result<T> {
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Endpoint;
    use crate::testing::MemoryNetbox;
    use pretty_assertions::assert_eq;

    struct Group;

    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct GroupData {
        name: String,
    }

    impl ResourceType for Group {
        const NAME: &'static str = "group";
        type Data = GroupData;

        fn endpoint() -> Endpoint {
            Endpoint::new("test", "groups")
        }

        fn query_params() -> &'static [&'static str] {
            &["name"]
        }
    }

    #[test]
    fn parse_error_names_the_module() {
        let err = parse_args::<Group>(r#"{"data": {"name": "x", "colour": "red"}}"#).unwrap_err();
        let doc = failure_document(&err);
        assert_eq!(doc["failed"], json!(true));
        let msg = doc["msg"].as_str().unwrap();
        assert!(msg.starts_with("Could not parse module arguments for group: "), "{}", msg);
        assert!(msg.contains("colour"), "{}", msg);
    }

    #[test]
    fn failure_document_for_each_error_class() {
        use crate::api::Operation;
        use crate::error::{Error, ResolutionFailure};

        let errors = vec![
            Error::validation("virtual_chassis requires one of the following: name, master"),
            Error::Resolution {
                field: "master".to_string(),
                value: "\"Gone\"".to_string(),
                reason: ResolutionFailure::NotFound,
            },
            Error::AmbiguousMatch {
                resource: "virtual_chassis".to_string(),
                query: "{name=VC}".to_string(),
            },
            Error::RemoteApi {
                operation: Operation::Create,
                endpoint: "dcim/virtual-chassis".to_string(),
                status: 400,
                message: "name: already exists.".to_string(),
            },
            Error::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
        ];
        for e in errors {
            let expected = e.to_string();
            let doc = failure_document(&anyhow::Error::from(e));
            assert_eq!(doc["failed"], json!(true));
            let msg = doc["msg"].as_str().unwrap();
            assert!(msg.starts_with(&expected), "{}", msg);
        }
    }

    #[test]
    fn result_document_exit_codes() {
        let (doc, code) = result_document(Ok(json!({"changed": false})));
        assert_eq!((doc, code), (json!({"changed": false}), 0));

        let (doc, code) = result_document::<Value>(Err(anyhow::anyhow!("boom")));
        assert_eq!((doc, code), (json!({"failed": true, "msg": "boom"}), 1));
    }

    #[test]
    fn unserializable_result_is_a_failure() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not representable"))
            }
        }

        let (doc, code) = result_document(Ok(Broken));
        assert_eq!(code, 1);
        assert_eq!(doc["failed"], json!(true));
        let msg = doc["msg"].as_str().unwrap();
        assert!(msg.starts_with("Could not serialize result document"), "{}", msg);
        assert!(msg.contains("not representable"), "{}", msg);
    }

    #[tokio::test]
    async fn check_flag_overrides_document() {
        let nb = MemoryNetbox::new();
        let args = parse_args::<Group>(r#"{"data": {"name": "x"}}"#).unwrap();
        let result = apply::<Group, _>(&nb, args, true).await.unwrap();
        assert!(result.changed);
        assert_eq!(nb.mutations(), 0);
    }

    #[tokio::test]
    async fn check_mode_from_document() {
        let nb = MemoryNetbox::new();
        let args =
            parse_args::<Group>(r#"{"data": {"name": "x"}, "_ansible_check_mode": true}"#).unwrap();
        let result = apply::<Group, _>(&nb, args, false).await.unwrap();
        assert!(result.changed);
        assert_eq!(nb.mutations(), 0);
    }

    #[test]
    fn read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.json");
        std::fs::write(&path, r#"{"data": {"name": "x"}}"#).unwrap();
        let options = Options {
            args_file: Some(path),
            ..Default::default()
        };
        let mut unused = tempfile::tempfile().unwrap();
        assert_eq!(
            read_input(&options, &mut unused).unwrap(),
            r#"{"data": {"name": "x"}}"#
        );
    }
}
