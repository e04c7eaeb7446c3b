//! vtx-compress - V4L2 视频压缩工具
//!
//! 从采集设备读取原始帧 (或 MJPEG), 按输出格式编码后写入输出设备
//! (例如 v4l2loopback) 或普通文件. Ctrl+C / SIGTERM 触发协作式停止.

mod logging;

use std::path::Path;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use vtx::{Pump, PumpConfig, StopReason, StopToken};
use vtx_codec::CodecOptions;
use vtx_codec::descriptor::{
    OPT_CBR, OPT_DRI, OPT_GOP, OPT_QUALITY, OPT_RC_CQP, OPT_RC_CRF, OPT_VBR,
};
use vtx_core::{FourCc, FrameSink, FrameSource};
use vtx_device::{FileSink, IoMode, V4l2Capture, V4l2Output};

#[derive(Parser, Debug)]
#[command(name = "vtx-compress", about = "V4L2 视频压缩工具")]
struct Cli {
    /// 采集设备
    #[arg(default_value = "/dev/video0")]
    source: String,

    /// 输出设备或文件
    #[arg(default_value = "/dev/video1")]
    dest: String,

    /// 输出格式 FourCC (H264, MJPG, JPEG 或原始格式; VP80/VP90/HEVC 需注册外部引擎)
    #[arg(short = 'f', long = "format", default_value = "H264")]
    format: FourCc,

    /// 关键帧间隔
    #[arg(short = 'G', long = "gop", default_value_t = 25)]
    gop: u32,

    /// 固定码率 (kbit/s), 优先于 -V
    #[arg(short = 'C', long = "cbr")]
    cbr: Option<u32>,

    /// 可变码率 (kbit/s)
    #[arg(short = 'V', long = "vbr", default_value_t = 1000)]
    vbr: u32,

    /// 固定 QP 码率控制
    #[arg(short = 'Q', long = "cqp")]
    cqp: Option<u32>,

    /// 恒定质量因子码率控制
    #[arg(short = 'F', long = "crf")]
    crf: Option<f32>,

    /// JPEG 质量 (0-100)
    #[arg(short = 'q', long = "quality")]
    quality: Option<u32>,

    /// JPEG 重启间隔 (MCU 数)
    #[arg(short = 'd', long = "dri")]
    dri: Option<u32>,

    /// 采集端使用 read(2) 而非 mmap
    #[arg(short = 'r', long = "read")]
    read_mode: bool,

    /// 就绪等待超时 (毫秒)
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// 显示版本和已注册的编解码器
    #[arg(long)]
    build_info: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// 命令行参数转换为编解码器选项
    fn codec_options(&self) -> CodecOptions {
        let mut opts = CodecOptions::new();
        opts.set(OPT_GOP, self.gop.to_string())
            .set(OPT_VBR, self.vbr.to_string());
        if let Some(v) = self.cbr {
            opts.set(OPT_CBR, v.to_string());
        }
        if let Some(v) = self.cqp {
            opts.set(OPT_RC_CQP, v.to_string());
        }
        if let Some(v) = self.crf {
            opts.set(OPT_RC_CRF, v.to_string());
        }
        if let Some(v) = self.quality {
            opts.set(OPT_QUALITY, v.to_string());
        }
        if let Some(v) = self.dri {
            opts.set(OPT_DRI, v.to_string());
        }
        opts
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init("vtx-compress", cli.verbose);

    if cli.build_info {
        print_build_info();
        return;
    }

    match run(&cli) {
        Ok(StopReason::Cancelled | StopReason::EndOfStream) => {}
        Ok(StopReason::ReadError) => process::exit(1),
        Err(e) => {
            eprintln!("错误: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<StopReason> {
    let mode = if cli.read_mode {
        IoMode::ReadWrite
    } else {
        IoMode::Mmap
    };
    let capture = V4l2Capture::open(&cli.source, mode)
        .with_context(|| format!("无法打开采集设备 '{}'", cli.source))?;
    let (width, height) = (capture.width(), capture.height());

    let dest = Path::new(&cli.dest);
    let sink: Box<dyn FrameSink> = if vtx_device::is_char_device(dest) {
        Box::new(
            V4l2Output::open(dest, cli.format, width, height)
                .with_context(|| format!("无法打开输出设备 '{}'", cli.dest))?,
        )
    } else {
        Box::new(
            FileSink::create(dest, cli.format, width, height)
                .with_context(|| format!("无法创建输出文件 '{}'", cli.dest))?,
        )
    };

    let registry = vtx::default_codec_registry();
    let config = PumpConfig::new(cli.format)
        .with_options(cli.codec_options())
        .with_verbose(cli.verbose)
        .with_poll_timeout(Duration::from_millis(cli.timeout_ms));
    let pump = Pump::new(&registry, capture, sink, &config).context("无法创建编解码器")?;

    let stop = StopToken::new();
    spawn_signal_thread(stop.clone()).context("无法注册信号处理")?;

    let report = pump.run(&stop);
    info!(
        "{}: {} 帧, {} 包, {} 字节",
        report.reason, report.stats.frames, report.stats.packets, report.stats.bytes
    );
    Ok(report.reason)
}

/// 独立线程等待 SIGINT / SIGTERM, 收到后触发停止令牌
fn spawn_signal_thread(stop: StopToken) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("收到信号 {sig}, 停止推流");
                stop.stop();
            }
        })?;
    Ok(())
}

fn print_build_info() {
    println!("vtx-compress 版本 {}", vtx::version());
    println!("  构建目标: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
    println!();

    let registry = vtx::default_codec_registry();
    let mut decoders = registry.list_decoders();
    let mut encoders = registry.list_encoders();
    decoders.sort_by_key(|(f, _)| f.to_string());
    encoders.sort_by_key(|(f, _)| f.to_string());

    println!("已注册编解码器:");
    println!("  解码器 ({}):", decoders.len());
    for (format, name) in &decoders {
        println!("    {name} ({format})");
    }
    println!("  编码器 ({}):", encoders.len());
    for (format, name) in &encoders {
        println!("    {name} ({format})");
    }
}
