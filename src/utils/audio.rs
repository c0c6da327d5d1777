use anyhow::{anyhow, Context, Result};
use log::debug;
use std::io::{Cursor, Read, Seek, SeekFrom};

pub const DEFAULT_PCM_SAMPLE_RATE: u32 = 24_000;

/// Wraps raw PCM samples (little-endian) in a RIFF/WAVE container.
pub fn pcm_to_wav(
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> Result<Vec<u8>> {
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * block_align as u32;
    // RIFF sizes are 32-bit
    let data_size = u32::try_from(pcm.len())
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .with_context(|| format!("PCM payload too large for WAV ({} bytes)", pcm.len()))?;

    let mut out = Vec::with_capacity(44 + pcm.len());
    // RIFF [4] + Size [4] + WAVE [4]
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk: PCM (1), channels, rate, byte rate, block align, bits
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Reads the `rate=` parameter of a mime type such as
/// `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("rate="))
        .and_then(|rate| rate.trim().parse().ok())
}

pub fn is_raw_pcm(mime_type: &str) -> bool {
    let base = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    base == "audio/l16" || base == "audio/pcm" || mime_type.contains("codec=pcm")
}

pub struct WavInfo {
    pub fmt_content: Vec<u8>,
    pub data_size: u32,
}

/// Walks the RIFF chunks of an in-memory WAV file.
pub fn scan_wav(bytes: &[u8]) -> Result<WavInfo> {
    let mut f = Cursor::new(bytes);

    let mut id = [0u8; 4];
    f.read_exact(&mut id)?;
    if &id != b"RIFF" {
        return Err(anyhow!("Not a RIFF file"));
    }

    f.seek(SeekFrom::Current(4))?;

    f.read_exact(&mut id)?;
    if &id != b"WAVE" {
        return Err(anyhow!("Not a WAVE file"));
    }

    let mut fmt_content: Option<Vec<u8>> = None;
    let mut data_size: Option<u32> = None;

    loop {
        let mut chunk_id = [0u8; 4];
        let n = f.read(&mut chunk_id)?;
        if n == 0 {
            break;
        }
        if n < 4 {
            return Err(anyhow!("Unexpected EOF reading chunk ID"));
        }

        let mut size_buf = [0u8; 4];
        f.read_exact(&mut size_buf)?;
        let chunk_size = u32::from_le_bytes(size_buf);

        if &chunk_id == b"fmt " {
            let mut buf = vec![0u8; chunk_size as usize];
            f.read_exact(&mut buf)?;
            fmt_content = Some(buf);
        } else if &chunk_id == b"data" {
            data_size = Some(chunk_size);
            break;
        } else {
            f.seek(SeekFrom::Current(chunk_size as i64))?;
        }
    }

    Ok(WavInfo {
        fmt_content: fmt_content.ok_or_else(|| anyhow!("Missing fmt chunk"))?,
        data_size: data_size.ok_or_else(|| anyhow!("Missing data chunk"))?,
    })
}

/// Converts a provider audio payload to something a player can open.
/// Raw PCM is wrapped as 16-bit mono WAV. WAV payloads must have a
/// readable header. Anything else is passed through.
pub fn to_playable(mime_type: &str, data: &[u8]) -> Result<(Vec<u8>, &'static str)> {
    if is_raw_pcm(mime_type) {
        let rate = sample_rate_from_mime(mime_type).unwrap_or(DEFAULT_PCM_SAMPLE_RATE);
        Ok((pcm_to_wav(data, rate, 1, 16)?, "wav"))
    } else if mime_type.contains("wav") {
        let info = scan_wav(data).context("Narration is labelled WAV but has no valid header")?;
        debug!(
            "WAV narration: {} bytes of samples, fmt chunk {} bytes",
            info.data_size,
            info.fmt_content.len()
        );
        Ok((data.to_vec(), "wav"))
    } else if mime_type.contains("mpeg") || mime_type.contains("mp3") {
        Ok((data.to_vec(), "mp3"))
    } else {
        Ok((data.to_vec(), "bin"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_wav_header() -> Result<()> {
        let pcm = vec![0u8; 480];
        let wav = pcm_to_wav(&pcm, 24_000, 1, 16)?;
        assert_eq!(wav.len(), 44 + 480);
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into()?), 36 + 480);

        let info = scan_wav(&wav)?;
        assert_eq!(info.data_size, 480);
        assert_eq!(info.fmt_content.len(), 16);
        let rate = u32::from_le_bytes(info.fmt_content[4..8].try_into()?);
        assert_eq!(rate, 24_000);
        let byte_rate = u32::from_le_bytes(info.fmt_content[8..12].try_into()?);
        assert_eq!(byte_rate, 48_000);
        Ok(())
    }

    #[test]
    fn test_sample_rate_from_mime() {
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=24000"), Some(24_000));
        assert_eq!(sample_rate_from_mime("audio/L16; rate=16000"), Some(16_000));
        assert_eq!(sample_rate_from_mime("audio/wav"), None);
    }

    #[test]
    fn test_to_playable() -> Result<()> {
        let (wav, ext) = to_playable("audio/L16;codec=pcm;rate=24000", &[1, 2, 3, 4])?;
        assert_eq!(ext, "wav");
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(wav.len(), 48);

        let (mp3, ext) = to_playable("audio/mpeg", b"ID3")?;
        assert_eq!(ext, "mp3");
        assert_eq!(mp3, b"ID3");
        Ok(())
    }

    #[test]
    fn test_wav_payload_is_checked() -> Result<()> {
        let wav = pcm_to_wav(&[0u8; 8], 16_000, 1, 16)?;
        let (passed, ext) = to_playable("audio/wav", &wav)?;
        assert_eq!(ext, "wav");
        assert_eq!(passed, wav);

        let err = to_playable("audio/wav", b"not a wav file").unwrap_err();
        assert!(err.to_string().contains("no valid header"));
        Ok(())
    }

    #[test]
    fn test_scan_rejects_non_wav() {
        assert!(scan_wav(b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00").is_err());
    }
}
