//! 像素格式转换.
//!
//! 支持的转换路径 (均以 I420 为一端):
//! - YU12 / YV12 ↔ I420 (平面复制, YV12 交换 U/V)
//! - NV12 / NV21 ↔ I420 (色度交错/解交错)
//! - YUYV / UYVY ↔ I420 (4:2:2 → 4:2:0 时相邻两行色度取平均)
//! - RGB3 / BGR3 / AB24 / AR24 ↔ I420 (BT.601, 2x2 块色度平均)
//! - GREY ↔ I420 (色度填充 128)
//!
//! 使用 BT.601 标准色彩矩阵:
//! ```text
//! Y  =  0.299 * R + 0.587 * G + 0.114 * B
//! Cb = -0.169 * R - 0.331 * G + 0.500 * B + 128
//! Cr =  0.500 * R - 0.419 * G - 0.081 * B + 128
//! ```

use log::trace;
use rayon::prelude::*;
use vtx_core::{FourCc, PixelFormat, VtxError, VtxResult};

use crate::I420Image;

/// 检查格式是否可与 I420 互转
pub fn is_supported(format: FourCc) -> bool {
    PixelFormat::from_fourcc(format).is_some()
}

fn lookup(format: FourCc) -> VtxResult<PixelFormat> {
    PixelFormat::from_fourcc(format)
        .ok_or_else(|| VtxError::Unsupported(format!("不支持的像素格式转换: {format} ↔ I420")))
}

fn check_dimensions(width: u32, height: u32) -> VtxResult<()> {
    if width == 0 || height == 0 {
        return Err(VtxError::InvalidArgument(format!(
            "无效分辨率: {width}x{height}"
        )));
    }
    Ok(())
}

/// 将一帧原始数据转换为 I420, 写入 `dst`
///
/// 分辨率取自 `dst`. `src` 不足一帧时返回 `InvalidData`, `dst` 不被修改.
pub fn to_i420(src: &[u8], format: FourCc, dst: &mut I420Image) -> VtxResult<()> {
    let pf = lookup(format)?;
    check_dimensions(dst.width(), dst.height())?;
    let need = pf.frame_size(dst.width(), dst.height());
    if src.len() < need {
        return Err(VtxError::InvalidData(format!(
            "{pf} 帧数据不足: {} < {need}",
            src.len()
        )));
    }
    if src.len() > need {
        // 驱动常把 sizeimage 对齐到页大小, 尾部填充直接忽略
        trace!("{pf} 输入多出 {} 字节, 已忽略", src.len() - need);
    }
    let src = &src[..need];

    match pf {
        PixelFormat::Yuv420p => planar_to_i420(src, dst, false),
        PixelFormat::Yvu420p => planar_to_i420(src, dst, true),
        PixelFormat::Nv12 => semi_planar_to_i420(src, dst, false),
        PixelFormat::Nv21 => semi_planar_to_i420(src, dst, true),
        PixelFormat::Yuyv => packed422_to_i420(src, dst, Packed422::YUYV),
        PixelFormat::Uyvy => packed422_to_i420(src, dst, Packed422::UYVY),
        PixelFormat::Rgb24 => rgb_to_i420(src, dst, RgbLayout::RGB24),
        PixelFormat::Bgr24 => rgb_to_i420(src, dst, RgbLayout::BGR24),
        PixelFormat::Rgba => rgb_to_i420(src, dst, RgbLayout::RGBA),
        PixelFormat::Bgra => rgb_to_i420(src, dst, RgbLayout::BGRA),
        PixelFormat::Gray8 => gray_to_i420(src, dst),
    }
    Ok(())
}

/// 将 I420 图像转换为 `format`, 写入 `dst`, 返回写入的字节数
///
/// `dst` 可以大于一帧 (例如输出设备声明的缓冲区更大), 多余部分保持不变.
pub fn from_i420(src: &I420Image, format: FourCc, dst: &mut [u8]) -> VtxResult<usize> {
    let pf = lookup(format)?;
    check_dimensions(src.width(), src.height())?;
    let need = pf.frame_size(src.width(), src.height());
    if dst.len() < need {
        return Err(VtxError::InvalidArgument(format!(
            "{pf} 输出缓冲区不足: {} < {need}",
            dst.len()
        )));
    }
    let out = &mut dst[..need];

    match pf {
        PixelFormat::Yuv420p => i420_to_planar(src, out, false),
        PixelFormat::Yvu420p => i420_to_planar(src, out, true),
        PixelFormat::Nv12 => i420_to_semi_planar(src, out, false),
        PixelFormat::Nv21 => i420_to_semi_planar(src, out, true),
        PixelFormat::Yuyv => i420_to_packed422(src, out, Packed422::YUYV),
        PixelFormat::Uyvy => i420_to_packed422(src, out, Packed422::UYVY),
        PixelFormat::Rgb24 => i420_to_rgb(src, out, RgbLayout::RGB24),
        PixelFormat::Bgr24 => i420_to_rgb(src, out, RgbLayout::BGR24),
        PixelFormat::Rgba => i420_to_rgb(src, out, RgbLayout::RGBA),
        PixelFormat::Bgra => i420_to_rgb(src, out, RgbLayout::BGRA),
        PixelFormat::Gray8 => out.copy_from_slice(src.y()),
    }
    Ok(need)
}

// ============================================================
// BT.601 颜色空间转换常量 (定点数, 缩放 256 倍)
// ============================================================

const Y_R: i32 = 77; // 0.299 * 256
const Y_G: i32 = 150; // 0.587 * 256
const Y_B: i32 = 29; // 0.114 * 256

const CB_R: i32 = -43; // -0.169 * 256
const CB_G: i32 = -85; // -0.331 * 256
const CB_B: i32 = 128; // 0.500 * 256

const CR_R: i32 = 128; // 0.500 * 256
const CR_G: i32 = -107; // -0.419 * 256
const CR_B: i32 = -21; // -0.081 * 256

#[inline]
fn rgb_to_y(r: i32, g: i32, b: i32) -> u8 {
    ((Y_R * r + Y_G * g + Y_B * b + 128) >> 8).clamp(0, 255) as u8
}

#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = i32::from(y);
    let u = i32::from(u) - 128;
    let v = i32::from(v) - 128;
    let r = (y + ((v * 359 + 128) >> 8)).clamp(0, 255);
    let g = (y - ((u * 88 + v * 183 + 128) >> 8)).clamp(0, 255);
    let b = (y + ((u * 454 + 128) >> 8)).clamp(0, 255);
    (r as u8, g as u8, b as u8)
}

#[inline]
fn avg2(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + 1) >> 1) as u8
}

// ============================================================
// 平面 / 半平面
// ============================================================

fn planar_to_i420(src: &[u8], dst: &mut I420Image, swap_uv: bool) {
    let luma = dst.y().len();
    let chroma = dst.u().len();
    let (y, u, v) = dst.planes_mut();
    y.copy_from_slice(&src[..luma]);
    let first = &src[luma..luma + chroma];
    let second = &src[luma + chroma..luma + 2 * chroma];
    if swap_uv {
        u.copy_from_slice(second);
        v.copy_from_slice(first);
    } else {
        u.copy_from_slice(first);
        v.copy_from_slice(second);
    }
}

fn i420_to_planar(src: &I420Image, dst: &mut [u8], swap_uv: bool) {
    let luma = src.y().len();
    let chroma = src.u().len();
    dst[..luma].copy_from_slice(src.y());
    let (first, second) = if swap_uv {
        (src.v(), src.u())
    } else {
        (src.u(), src.v())
    };
    dst[luma..luma + chroma].copy_from_slice(first);
    dst[luma + chroma..].copy_from_slice(second);
}

/// NV12/NV21 → I420: 色度解交错
fn semi_planar_to_i420(src: &[u8], dst: &mut I420Image, swap_uv: bool) {
    let luma = dst.y().len();
    let (y, u, v) = dst.planes_mut();
    y.copy_from_slice(&src[..luma]);
    let (u_off, v_off) = if swap_uv { (1, 0) } else { (0, 1) };
    for (i, pair) in src[luma..].chunks_exact(2).enumerate() {
        u[i] = pair[u_off];
        v[i] = pair[v_off];
    }
}

/// I420 → NV12/NV21: 色度交错
fn i420_to_semi_planar(src: &I420Image, dst: &mut [u8], swap_uv: bool) {
    let luma = src.y().len();
    dst[..luma].copy_from_slice(src.y());
    let (u_off, v_off) = if swap_uv { (1, 0) } else { (0, 1) };
    for (i, pair) in dst[luma..].chunks_exact_mut(2).enumerate() {
        pair[u_off] = src.u()[i];
        pair[v_off] = src.v()[i];
    }
}

// ============================================================
// 打包 4:2:2
// ============================================================

/// 4 字节宏像素内各分量偏移, 第二个 Y 位于 `y0 + 2`
#[derive(Clone, Copy)]
struct Packed422 {
    y0: usize,
    u: usize,
    v: usize,
}

impl Packed422 {
    const YUYV: Self = Self { y0: 0, u: 1, v: 3 };
    const UYVY: Self = Self { y0: 1, u: 0, v: 2 };
}

fn packed422_to_i420(src: &[u8], dst: &mut I420Image, layout: Packed422) {
    let w = dst.width() as usize;
    let h = dst.height() as usize;
    let cw = dst.chroma_width();
    let stride = cw * 4;
    let (y, u, v) = dst.planes_mut();

    y.par_chunks_mut(w).enumerate().for_each(|(row, out)| {
        let line = &src[row * stride..(row + 1) * stride];
        for (col, px) in out.iter_mut().enumerate() {
            *px = line[(col / 2) * 4 + layout.y0 + (col % 2) * 2];
        }
    });

    // 垂直方向 2:1 下采样, 末行为奇数时与自身平均
    for (cy, (u_row, v_row)) in u.chunks_mut(cw).zip(v.chunks_mut(cw)).enumerate() {
        let r0 = cy * 2 * stride;
        let r1 = (cy * 2 + 1).min(h - 1) * stride;
        for cx in 0..cw {
            u_row[cx] = avg2(src[r0 + cx * 4 + layout.u], src[r1 + cx * 4 + layout.u]);
            v_row[cx] = avg2(src[r0 + cx * 4 + layout.v], src[r1 + cx * 4 + layout.v]);
        }
    }
}

fn i420_to_packed422(src: &I420Image, dst: &mut [u8], layout: Packed422) {
    let w = src.width() as usize;
    let cw = src.chroma_width();
    let stride = cw * 4;

    dst.par_chunks_mut(stride).enumerate().for_each(|(row, line)| {
        let y_row = &src.y()[row * w..(row + 1) * w];
        let c_off = (row / 2) * cw;
        for (cx, mp) in line.chunks_exact_mut(4).enumerate() {
            let y0 = y_row[cx * 2];
            let y1 = y_row.get(cx * 2 + 1).copied().unwrap_or(y0);
            mp[layout.y0] = y0;
            mp[layout.y0 + 2] = y1;
            mp[layout.u] = src.u()[c_off + cx];
            mp[layout.v] = src.v()[c_off + cx];
        }
    });
}

// ============================================================
// RGB
// ============================================================

/// 打包 RGB 的通道偏移
#[derive(Clone, Copy)]
struct RgbLayout {
    r: usize,
    g: usize,
    b: usize,
    alpha: Option<usize>,
    bpp: usize,
}

impl RgbLayout {
    const RGB24: Self = Self {
        r: 0,
        g: 1,
        b: 2,
        alpha: None,
        bpp: 3,
    };
    const BGR24: Self = Self {
        r: 2,
        g: 1,
        b: 0,
        alpha: None,
        bpp: 3,
    };
    const RGBA: Self = Self {
        r: 0,
        g: 1,
        b: 2,
        alpha: Some(3),
        bpp: 4,
    };
    const BGRA: Self = Self {
        r: 2,
        g: 1,
        b: 0,
        alpha: Some(3),
        bpp: 4,
    };
}

/// RGB → I420 (BT.601, 2x2 块色度平均)
fn rgb_to_i420(src: &[u8], dst: &mut I420Image, layout: RgbLayout) {
    let w = dst.width() as usize;
    let h = dst.height() as usize;
    let cw = dst.chroma_width();
    let stride = w * layout.bpp;
    let (y, u, v) = dst.planes_mut();

    y.par_chunks_mut(w).enumerate().for_each(|(row, out)| {
        let line = &src[row * stride..(row + 1) * stride];
        for (px, rgb) in out.iter_mut().zip(line.chunks_exact(layout.bpp)) {
            *px = rgb_to_y(
                i32::from(rgb[layout.r]),
                i32::from(rgb[layout.g]),
                i32::from(rgb[layout.b]),
            );
        }
    });

    for (cy, (u_row, v_row)) in u.chunks_mut(cw).zip(v.chunks_mut(cw)).enumerate() {
        for cx in 0..cw {
            let mut sum = [0i32; 3];
            let mut count = 0i32;
            for row in (cy * 2)..(cy * 2 + 2).min(h) {
                for col in (cx * 2)..(cx * 2 + 2).min(w) {
                    let off = row * stride + col * layout.bpp;
                    sum[0] += i32::from(src[off + layout.r]);
                    sum[1] += i32::from(src[off + layout.g]);
                    sum[2] += i32::from(src[off + layout.b]);
                    count += 1;
                }
            }
            let (r, g, b) = (sum[0] / count, sum[1] / count, sum[2] / count);
            let cb = ((CB_R * r + CB_G * g + CB_B * b + 128) >> 8) + 128;
            let cr = ((CR_R * r + CR_G * g + CR_B * b + 128) >> 8) + 128;
            u_row[cx] = cb.clamp(0, 255) as u8;
            v_row[cx] = cr.clamp(0, 255) as u8;
        }
    }
}

/// I420 → RGB (BT.601 逆变换, alpha 填充 255)
fn i420_to_rgb(src: &I420Image, dst: &mut [u8], layout: RgbLayout) {
    let w = src.width() as usize;
    let cw = src.chroma_width();

    dst.par_chunks_mut(w * layout.bpp)
        .enumerate()
        .for_each(|(row, line)| {
            let y_row = &src.y()[row * w..(row + 1) * w];
            let c_off = (row / 2) * cw;
            for (col, px) in line.chunks_exact_mut(layout.bpp).enumerate() {
                let (r, g, b) = yuv_to_rgb(
                    y_row[col],
                    src.u()[c_off + col / 2],
                    src.v()[c_off + col / 2],
                );
                px[layout.r] = r;
                px[layout.g] = g;
                px[layout.b] = b;
                if let Some(a) = layout.alpha {
                    px[a] = 255;
                }
            }
        });
}

fn gray_to_i420(src: &[u8], dst: &mut I420Image) {
    let (y, u, v) = dst.planes_mut();
    y.copy_from_slice(src);
    u.fill(128);
    v.fill(128);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> I420Image {
        let mut img = I420Image::new(w, h);
        let cw = img.chroma_width();
        let (y, u, v) = img.planes_mut();
        for (i, px) in y.iter_mut().enumerate() {
            *px = (i % 251) as u8;
        }
        for (i, px) in u.iter_mut().enumerate() {
            *px = (64 + (i % cw) * 3) as u8;
        }
        for (i, px) in v.iter_mut().enumerate() {
            *px = (200 - (i / cw) * 5) as u8;
        }
        img
    }

    #[test]
    fn test_yu12_直通() {
        let src = gradient(6, 4);
        let mut raw = vec![0u8; src.frame_size()];
        assert_eq!(from_i420(&src, FourCc::YU12, &mut raw).unwrap(), 36);
        assert_eq!(raw, src.to_bytes());

        let mut back = I420Image::new(6, 4);
        to_i420(&raw, FourCc::YU12, &mut back).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_yv12_交换色度() {
        let src = gradient(4, 4);
        let mut raw = vec![0u8; src.frame_size()];
        from_i420(&src, FourCc::YV12, &mut raw).unwrap();
        assert_eq!(&raw[16..20], src.v());
        assert_eq!(&raw[20..24], src.u());

        let mut back = I420Image::new(4, 4);
        to_i420(&raw, FourCc::YV12, &mut back).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_nv12_nv21_无损() {
        let src = gradient(8, 6);
        for format in [FourCc::NV12, FourCc::NV21] {
            let mut raw = vec![0u8; src.frame_size()];
            from_i420(&src, format, &mut raw).unwrap();
            let mut back = I420Image::new(8, 6);
            to_i420(&raw, format, &mut back).unwrap();
            assert_eq!(back, src, "{format} 往返不一致");
        }
        let mut nv21 = vec![0u8; src.frame_size()];
        from_i420(&src, FourCc::NV21, &mut nv21).unwrap();
        assert_eq!(nv21[48], src.v()[0]);
        assert_eq!(nv21[49], src.u()[0]);
    }

    #[test]
    fn test_yuyv_字节布局() {
        // 2x2: 两行宏像素, 色度按行平均
        let yuyv = [10, 100, 20, 200, 30, 110, 40, 210];
        let mut img = I420Image::new(2, 2);
        to_i420(&yuyv, FourCc::YUYV, &mut img).unwrap();
        assert_eq!(img.y(), &[10, 20, 30, 40]);
        assert_eq!(img.u(), &[105]);
        assert_eq!(img.v(), &[205]);

        let mut uyvy = [0u8; 8];
        from_i420(&img, FourCc::UYVY, &mut uyvy).unwrap();
        assert_eq!(uyvy, [105, 10, 205, 20, 105, 30, 205, 40]);
    }

    #[test]
    fn test_奇数宽度_packed422() {
        let src = gradient(5, 3);
        let mut raw = vec![0u8; PixelFormat::Yuyv.frame_size(5, 3)];
        from_i420(&src, FourCc::YUYV, &mut raw).unwrap();
        let mut back = I420Image::new(5, 3);
        to_i420(&raw, FourCc::YUYV, &mut back).unwrap();
        assert_eq!(back.y(), src.y());
    }

    #[test]
    fn test_rgb_基准色() {
        // 白, 黑
        let rgb = [255u8, 255, 255, 0, 0, 0, 255, 255, 255, 0, 0, 0];
        let mut img = I420Image::new(2, 2);
        to_i420(&rgb, FourCc::RGB3, &mut img).unwrap();
        assert_eq!(img.y(), &[255, 0, 255, 0]);
        assert!((i32::from(img.u()[0]) - 128).abs() <= 1);
        assert!((i32::from(img.v()[0]) - 128).abs() <= 1);
    }

    #[test]
    fn test_bgra_往返近似() {
        let w = 4u32;
        let h = 2u32;
        let mut bgra = Vec::new();
        for _ in 0..(w * h) {
            bgra.extend_from_slice(&[40, 120, 200, 0]);
        }
        let mut img = I420Image::new(w, h);
        to_i420(&bgra, FourCc::AR24, &mut img).unwrap();

        let mut out = vec![0u8; bgra.len()];
        from_i420(&img, FourCc::AR24, &mut out).unwrap();
        for px in out.chunks_exact(4) {
            assert!((i32::from(px[0]) - 40).abs() <= 3, "B={}", px[0]);
            assert!((i32::from(px[1]) - 120).abs() <= 3, "G={}", px[1]);
            assert!((i32::from(px[2]) - 200).abs() <= 3, "R={}", px[2]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_grey() {
        let grey = [1u8, 2, 3, 4];
        let mut img = I420Image::new(2, 2);
        to_i420(&grey, FourCc::GREY, &mut img).unwrap();
        assert_eq!(img.y(), &grey);
        assert_eq!(img.u(), &[128]);
        let mut out = [0u8; 4];
        from_i420(&img, FourCc::GREY, &mut out).unwrap();
        assert_eq!(out, grey);
    }

    #[test]
    fn test_输入不足() {
        let mut img = I420Image::new(4, 4);
        let err = to_i420(&[0u8; 10], FourCc::YUYV, &mut img).unwrap_err();
        assert!(matches!(err, VtxError::InvalidData(_)));
    }

    #[test]
    fn test_输出缓冲区更大() {
        let img = gradient(2, 2);
        let mut out = vec![0xEEu8; 10];
        assert_eq!(from_i420(&img, FourCc::YU12, &mut out).unwrap(), 6);
        assert_eq!(&out[6..], &[0xEE; 4]);
    }

    #[test]
    fn test_压缩格式不支持() {
        let mut img = I420Image::new(2, 2);
        assert!(matches!(
            to_i420(&[0u8; 6], FourCc::H264, &mut img),
            Err(VtxError::Unsupported(_))
        ));
        assert!(!is_supported(FourCc::MJPG));
        assert!(is_supported(FourCc::UYVY));
    }
}
