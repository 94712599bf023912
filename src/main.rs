//! Media Organizer CLI
//!
//! Import photos and videos into a managed library and edit the catalog.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use walkdir::WalkDir;

use media_organizer::inspect::inspect_file;
use media_organizer::thumbnail::{ImageThumbnailer, ThumbnailSpec, Thumbnailer, VideoThumbnailer};
use media_organizer::{
    LibraryConfig, LibraryError, MediaId, MediaKind, MediaLibrary, MediaRecord, ProgressReporter,
    SortOrder,
};

const ABOUT: &str = r#"
Media Organizer - 媒体库管理工具

使用示例:
  media_organizer import ~/Downloads/a.jpg ~/Downloads/b.mov   导入文件
  media_organizer import -r ~/Pictures --max-depth 5          递归导入目录
  media_organizer list --sort name                            按名称列出
  media_organizer favorite <id>                               切换收藏
  media_organizer rename <id> "新名称"                         重命名
  media_organizer delete <id>                                 删除
  media_organizer thumbnail photo.jpg preview.jpg             生成缩略图
"#;

/// Progress message interval for imports
const PROGRESS_INTERVAL_MS: u64 = 200;

/// Media library manager
#[derive(Parser)]
#[command(name = "media_organizer")]
#[command(author, version, about = ABOUT, long_about = None)]
#[command(help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// 媒体库目录
    #[arg(short = 'l', long, global = true, help = "媒体库目录（默认为系统数据目录）")]
    library: Option<PathBuf>,

    /// JSON 配置文件
    #[arg(short = 'c', long, global = true, help = "JSON格式的配置文件")]
    config: Option<PathBuf>,

    /// 显示帮助信息
    #[arg(short = 'h', long = "help", action = clap::ArgAction::Help, global = true)]
    help: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// 导入媒体文件
    #[command(about = "导入图片和视频到媒体库")]
    Import {
        /// 要导入的文件或目录
        #[arg(required = true, help = "要导入的文件或目录，可指定多个")]
        paths: Vec<PathBuf>,

        /// 递归导入子目录
        #[arg(short = 'r', long, help = "递归导入子目录中的文件")]
        recursive: bool,

        /// 最大递归深度
        #[arg(long, default_value = "3", help = "递归导入的最大深度")]
        max_depth: usize,

        /// 并行线程数（0 = 自动检测）
        #[arg(short = 't', long, help = "并行线程数，0表示自动检测")]
        threads: Option<usize>,

        /// 以 JSON 格式输出结果
        #[arg(long, help = "输出JSON格式的导入结果")]
        json: bool,

        /// 不输出进度信息
        #[arg(long, help = "不在stderr输出进度信息")]
        no_progress: bool,
    },

    /// 列出媒体库内容
    #[command(about = "列出媒体库中的所有条目")]
    List {
        /// 排序方式
        #[arg(short = 's', long, help = "排序方式: date, name, favorites")]
        sort: Option<SortOrder>,

        /// 以 JSON 格式输出
        #[arg(long, help = "输出JSON格式的列表")]
        json: bool,
    },

    /// 切换收藏状态
    #[command(about = "切换条目的收藏状态")]
    Favorite {
        /// 条目 ID
        id: MediaId,
    },

    /// 重命名条目
    #[command(about = "修改条目的显示名称")]
    Rename {
        /// 条目 ID
        id: MediaId,
        /// 新名称
        name: String,
    },

    /// 删除条目
    #[command(about = "从媒体库删除条目及其文件")]
    Delete {
        /// 条目 ID
        id: MediaId,
    },

    /// 生成单个缩略图
    #[command(about = "为单个文件生成缩略图，不写入媒体库")]
    Thumbnail {
        /// 源文件
        source: PathBuf,
        /// 输出 JPEG 文件
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("{}", ABOUT);
        println!("使用 'media_organizer --help' 查看完整帮助信息");
        return ExitCode::SUCCESS;
    };

    let config = match load_config(cli.library, cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(command, config) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(
    library: Option<PathBuf>,
    config_file: Option<&Path>,
) -> Result<LibraryConfig, LibraryError> {
    let mut config = match config_file {
        Some(path) => LibraryConfig::from_json_file(path)?,
        None => LibraryConfig::new(LibraryConfig::default_library_dir()),
    };
    if let Some(dir) = library {
        config.library_dir = dir;
    }
    Ok(config)
}

fn run(command: Commands, mut config: LibraryConfig) -> Result<ExitCode, LibraryError> {
    match command {
        Commands::Import {
            paths,
            recursive,
            max_depth,
            threads,
            json,
            no_progress,
        } => {
            if let Some(threads) = threads {
                config.num_threads = threads;
            }
            let files = expand_paths(&paths, recursive, max_depth);
            info!("Importing {} files into {:?}", files.len(), config.library_dir);
            let library = MediaLibrary::open(config)?;
            import(&library, files, json, !no_progress)
        }
        Commands::List { sort, json } => {
            let library = MediaLibrary::open(config)?;
            if let Some(order) = sort {
                library.sort(order)?;
            }
            let records = library.snapshot()?;
            if json {
                print_json(&records);
            } else {
                for record in &records {
                    print_record(record);
                }
                let order = library.sort_order()?;
                println!("{} items, sorted by {}", records.len(), order.title());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Favorite { id } => {
            let library = MediaLibrary::open(config)?;
            edited(library.toggle_favorite(id)?, id)
        }
        Commands::Rename { id, name } => {
            let library = MediaLibrary::open(config)?;
            edited(library.rename(id, name)?, id)
        }
        Commands::Delete { id } => {
            let library = MediaLibrary::open(config)?;
            match library.delete(id)? {
                Some(record) => {
                    println!("Deleted {} ({})", record.name, record.id);
                    Ok(ExitCode::SUCCESS)
                }
                None => not_found(id),
            }
        }
        Commands::Thumbnail { source, output } => thumbnail(&config, &source, &output),
    }
}

/// Files named on the command line plus the contents of named directories
fn expand_paths(paths: &[PathBuf], recursive: bool, max_depth: usize) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            // Missing files are reported per file by the import.
            files.push(path.clone());
            continue;
        }

        let depth = if recursive { max_depth.max(1) } else { 1 };
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry.file_name()));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => warn!("Skipping unreadable entry: {}", err),
            }
        }
    }
    files
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn import(
    library: &MediaLibrary,
    files: Vec<PathBuf>,
    json: bool,
    show_progress: bool,
) -> Result<ExitCode, LibraryError> {
    let reporter = Arc::new(ProgressReporter::new(show_progress, PROGRESS_INTERVAL_MS));
    reporter.report_start(files.len(), &library.config().library_dir);

    let (tx, rx) = crossbeam_channel::bounded(1);
    let progress_reporter = Arc::clone(&reporter);
    library.import(
        files,
        move |_catalog, progress| {
            progress_reporter.report_progress(progress);
        },
        move |_catalog, result| {
            let _ = tx.send(result);
        },
    );

    let Ok(result) = rx.recv() else {
        return Err(LibraryError::CoordinatorClosed);
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            reporter.report_batch_error(&err);
            error!("{}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    for failure in &outcome.failures {
        reporter.report_error(failure);
    }
    reporter.report_done(&outcome);

    if json {
        let failures: Vec<_> = outcome
            .failures
            .iter()
            .map(|f| {
                serde_json::json!({
                    "kind": f.kind.as_str(),
                    "path": f.path,
                    "message": f.message,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "imported": outcome.records,
            "failed": failures,
            "cancelled": outcome.cancelled,
            "duration_ms": outcome.duration_ms,
        }));
    } else {
        println!("Import completed:");
        println!("  Imported: {}", outcome.records.len());
        println!("  Failed: {}", outcome.error_count());
        println!("  Duration: {}ms", outcome.duration_ms);
        if let Some(summary) = outcome.error_summary() {
            println!("{}", summary);
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn thumbnail(config: &LibraryConfig, source: &Path, output: &Path) -> Result<ExitCode, LibraryError> {
    let Some(inspection) = inspect_file(source)? else {
        error!("{:?} is not a supported image or video", source);
        return Ok(ExitCode::FAILURE);
    };

    let spec = ThumbnailSpec::from_config(config);
    let thumbnailer: Box<dyn Thumbnailer> = match inspection.kind {
        MediaKind::Image => Box::new(ImageThumbnailer),
        MediaKind::Video => Box::new(VideoThumbnailer::new(&config.ffmpeg_path)),
    };
    let thumbnail = thumbnailer.render(source, &spec)?.write_to(output)?;
    println!(
        "Wrote {}x{} thumbnail to {:?}",
        thumbnail.width, thumbnail.height, thumbnail.file_path
    );
    Ok(ExitCode::SUCCESS)
}

fn edited(record: Option<MediaRecord>, id: MediaId) -> Result<ExitCode, LibraryError> {
    match record {
        Some(record) => {
            print_record(&record);
            Ok(ExitCode::SUCCESS)
        }
        None => not_found(id),
    }
}

fn not_found(id: MediaId) -> Result<ExitCode, LibraryError> {
    error!("No media with id {}", id);
    Ok(ExitCode::FAILURE)
}

fn print_record(record: &MediaRecord) {
    println!(
        "{}  {}{:<6} {:<30} {}",
        record.id,
        if record.is_favorite { "★ " } else { "  " },
        record.kind.as_str(),
        record.name,
        record.creation_date.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => error!("Failed to serialize output: {}", err),
    }
}
