//! Zip archive of a data directory
//!
//! Entry names are relative to the archived directory and always use `/`.
//! Extraction validates every entry before writing anything: an entry whose
//! resolved path would leave the target directory rejects the whole archive.

use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{DriplnkError, Result};

/// 把 `src` 目录递归打包到 `dest`，返回写入的文件数
pub fn archive_dir(src: &Path, dest: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(DriplnkError::snapshot(format!(
            "数据目录不存在: {}",
            src.display()
        )));
    }

    let file = File::create(dest)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    add_dir(&mut writer, src, src, options, &mut files)?;
    writer.finish()?.flush()?;

    debug!("Archived {} files from {} into {}", files, src.display(), dest.display());
    Ok(files)
}

fn add_dir<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
    files: &mut usize,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry_name(root, &path)?;

        if entry.file_type()?.is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
            add_dir(writer, root, &path, options, files)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = File::open(&path)?;
            io::copy(&mut source, writer)?;
            *files += 1;
        }
    }
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        DriplnkError::snapshot(format!("{} 不在 {} 之内", path.display(), root.display()))
    })?;

    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().map(str::to_string).ok_or_else(|| {
                DriplnkError::snapshot(format!("文件名不是合法 UTF-8: {}", path.display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

/// 归档内条目在 `target` 下的落盘路径；越界条目返回错误
pub fn resolve_entry(target: &Path, name: &str) -> Result<PathBuf> {
    let mut resolved = target.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => {
                resolved.pop();
                depth -= 1;
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DriplnkError::snapshot(format!(
                    "归档条目越出目标目录: {}",
                    name
                )));
            }
        }
    }

    if depth == 0 {
        return Err(DriplnkError::snapshot(format!("归档条目路径为空: {:?}", name)));
    }
    Ok(resolved)
}

/// 解压到 `target`（覆盖同名文件），返回写入的文件数
pub fn extract_archive<R: Read + Seek>(reader: R, target: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(reader)?;

    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let path = resolve_entry(target, entry.name())?;
        plan.push((index, path, entry.is_dir()));
    }

    fs::create_dir_all(target)?;
    let mut files = 0;
    for (index, path, is_dir) in plan {
        if is_dir {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = archive.by_index(index)?;
        let mut out = File::create(&path)?;
        io::copy(&mut entry, &mut out)?;
        files += 1;
    }

    debug!("Extracted {} files into {}", files, target.display());
    Ok(files)
}
