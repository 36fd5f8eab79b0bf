//! 本地管理员命令行工具：
//! - 初始化数据库
//! - 创建用户资料、签发登录会话（便于本地联调上传流程）
//! - 查看资料、清除头像

use std::env;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use profile_backend::AppConfig;
use profile_backend::db;
use profile_backend::features::auth::SessionStore;
use profile_backend::features::profile::{NewProfile, SqliteProfileStore, StudentProfile};
use profile_backend::storage::{ObjectStorage, ObjectStoreHandle};

#[derive(Debug, Clone)]
struct Args {
    help: bool,
    json: bool,
    cmd: Option<Command>,
}

#[derive(Debug, Clone)]
enum Command {
    Help,
    Init,
    CreateProfile(NewProfile),
    IssueSession { user_id: String, ttl_secs: Option<u64> },
    ShowProfile { user_id: String },
    ListProfiles,
    ClearPicture { user_id: String, delete_object: bool },
}

#[derive(Debug)]
enum CliError {
    Args(String),
    Config(String),
    Failed(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Args(msg) => write!(f, "参数错误: {msg}"),
            CliError::Config(msg) => write!(f, "配置错误: {msg}"),
            CliError::Failed(msg) => write!(f, "执行失败: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

fn failed(e: impl Display) -> CliError {
    CliError::Failed(e.to_string())
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, CliError> {
        let mut help = false;
        let mut json = false;
        let mut idx = 0usize;

        while idx < argv.len() {
            match argv[idx].as_str() {
                "-h" | "--help" => help = true,
                "--json" => json = true,
                _ => break,
            }
            idx += 1;
        }

        let cmd = if idx >= argv.len() {
            None
        } else {
            Some(parse_command(&argv[idx], &argv[(idx + 1)..])?)
        };
        Ok(Self { help, json, cmd })
    }
}

/// 解析 `--flag value` 形式的参数
fn flag_values(rest: &[String], known: &[&str]) -> Result<Vec<(String, String)>, CliError> {
    let mut out = Vec::new();
    let mut idx = 0usize;
    while idx < rest.len() {
        let flag = rest[idx].as_str();
        if !known.contains(&flag) {
            return Err(CliError::Args(format!("未知参数: {flag}")));
        }
        let value = rest
            .get(idx + 1)
            .ok_or_else(|| CliError::Args(format!("缺少 {flag} 的值")))?;
        out.push((flag.to_string(), value.clone()));
        idx += 2;
    }
    Ok(out)
}

fn required(values: &[(String, String)], flag: &str) -> Result<String, CliError> {
    values
        .iter()
        .find(|(k, _)| k == flag)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| CliError::Args(format!("缺少 {flag}")))
}

fn optional(values: &[(String, String)], flag: &str) -> Option<String> {
    values.iter().find(|(k, _)| k == flag).map(|(_, v)| v.clone())
}

fn parse_command(name: &str, rest: &[String]) -> Result<Command, CliError> {
    match name {
        "init" => Ok(Command::Init),
        "list-profiles" => Ok(Command::ListProfiles),
        "help" => Ok(Command::Help),
        "create-profile" => {
            let v = flag_values(rest, &["--user-id", "--name", "--email", "--institute"])?;
            let user_id = required(&v, "--user-id")?;
            Ok(Command::CreateProfile(NewProfile {
                short_name: optional(&v, "--name").unwrap_or_else(|| user_id.clone()),
                email: optional(&v, "--email").unwrap_or_default(),
                institute: optional(&v, "--institute").unwrap_or_default(),
                user_id,
            }))
        }
        "issue-session" => {
            let v = flag_values(rest, &["--user-id", "--ttl-secs"])?;
            let ttl_secs = optional(&v, "--ttl-secs")
                .map(|raw| {
                    raw.parse::<u64>()
                        .map_err(|_| CliError::Args(format!("--ttl-secs 不是合法整数: {raw}")))
                })
                .transpose()?;
            Ok(Command::IssueSession {
                user_id: required(&v, "--user-id")?,
                ttl_secs,
            })
        }
        "show-profile" => {
            let v = flag_values(rest, &["--user-id"])?;
            Ok(Command::ShowProfile {
                user_id: required(&v, "--user-id")?,
            })
        }
        "clear-picture" => {
            let delete_object = rest.iter().any(|a| a == "--delete-object");
            let rest: Vec<String> = rest
                .iter()
                .filter(|a| *a != "--delete-object")
                .cloned()
                .collect();
            let v = flag_values(&rest, &["--user-id"])?;
            Ok(Command::ClearPicture {
                user_id: required(&v, "--user-id")?,
                delete_object,
            })
        }
        _ => Err(CliError::Args(format!("未知命令: {name}"))),
    }
}

struct Context {
    config: AppConfig,
    sessions: SessionStore,
    profiles: SqliteProfileStore,
    objects: ObjectStoreHandle,
}

async fn open_context() -> Result<Context, CliError> {
    let config = AppConfig::load().map_err(|e| CliError::Config(e.to_string()))?;
    let pool = db::connect_sqlite(&config.database).await.map_err(failed)?;
    db::init_schema(&pool).await.map_err(failed)?;
    Ok(Context {
        sessions: SessionStore::new(pool.clone()),
        profiles: SqliteProfileStore::new(pool),
        objects: ObjectStoreHandle::from_config(&config.storage),
        config,
    })
}

fn print_profile(p: &StudentProfile, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(p).map_err(failed)?);
        return Ok(());
    }
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        p.user_id,
        p.short_name,
        p.email,
        p.institute,
        p.picture_key.as_ref().map(|k| k.as_str()).unwrap_or("-"),
        p.modified_at.to_rfc3339()
    );
    Ok(())
}

async fn run(ctx: Context, cmd: Command, as_json: bool) -> Result<(), CliError> {
    match cmd {
        Command::Help => print_help(),
        Command::Init => println!("数据库已就绪: {}", ctx.config.database.sqlite_path),
        Command::CreateProfile(new) => {
            let created = ctx.profiles.create(&new).await.map_err(failed)?;
            print_profile(&created, as_json)?;
        }
        Command::IssueSession { user_id, ttl_secs } => {
            let ttl = ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| ctx.config.session.ttl());
            let token = ctx.sessions.issue(&user_id, ttl).await.map_err(failed)?;
            if as_json {
                let v = serde_json::json!({ "userId": user_id, "token": token, "ttlSecs": ttl.as_secs() });
                println!("{v}");
            } else {
                println!("{token}");
            }
        }
        Command::ShowProfile { user_id } => {
            let profile = ctx
                .profiles
                .get(&user_id)
                .await
                .map_err(failed)?
                .ok_or_else(|| CliError::Failed(format!("资料不存在: {user_id}")))?;
            print_profile(&profile, as_json)?;
        }
        Command::ListProfiles => {
            let all = ctx.profiles.list().await.map_err(failed)?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&all).map_err(failed)?);
            } else {
                for p in &all {
                    print_profile(p, false)?;
                }
            }
        }
        Command::ClearPicture {
            user_id,
            delete_object,
        } => {
            let old = ctx
                .profiles
                .get(&user_id)
                .await
                .map_err(failed)?
                .and_then(|p| p.picture_key);
            ctx.profiles.clear_picture_key(&user_id).await.map_err(failed)?;
            if delete_object && let Some(key) = &old {
                ctx.objects.delete(key).await.map_err(failed)?;
                println!("已删除头像文件: {key}");
            }
            println!("已清除 {user_id} 的头像");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse(env::args().skip(1).collect())?;
    let Some(cmd) = args.cmd else {
        print_help();
        return Ok(());
    };
    if args.help || matches!(cmd, Command::Help) {
        print_help();
        return Ok(());
    }

    let outcome = match open_context().await {
        Ok(ctx) => run(ctx, cmd, args.json).await,
        Err(e) => Err(e),
    };
    if let Err(err) = outcome {
        eprintln!("{err}");
        std::process::exit(2);
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"profile_admin（管理员本地工具，直接读写配置中的 SQLite 与对象存储）

全局参数：
  --json                    JSON 输出（便于脚本集成）
  -h, --help                显示帮助

命令：
  init                      建表（幂等）
  create-profile
    --user-id ID            用户 ID（必填）
    --name NAME             显示名，默认同用户 ID
    --email EMAIL
    --institute NAME
  issue-session
    --user-id ID            为用户签发登录会话，输出令牌
    --ttl-secs N            有效期，默认取 session.ttl_secs
  show-profile
    --user-id ID
  list-profiles
  clear-picture
    --user-id ID            清除头像键
    --delete-object         同时删除存储中的头像文件

示例：
  cargo run --bin profile_admin -- create-profile --user-id alice --email alice@example.com
  cargo run --bin profile_admin -- issue-session --user-id alice
  curl -F studentprofilephoto=@me.jpg -H "Authorization: Bearer <token>" \
       http://127.0.0.1:8080/page/studentProfilePictureUpload
"#
    );
}
