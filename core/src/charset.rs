//! UTF variant detection for response bodies.
//!
//! Serialized payloads are text, but transports hand back raw bytes. The
//! variant is guessed from a byte-order mark, or failing that from where
//! the null bytes fall in the first four bytes (an ASCII-leading document
//! encoded as UTF-16/32 has a fixed null pattern). Anything else is UTF-8.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];
const BOM_UTF32_LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const BOM_UTF32_BE: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

/// Guess the encoding and the length of any byte-order mark to skip.
pub fn sniff(data: &[u8]) -> (Utf, usize) {
    let sample = &data[..data.len().min(4)];

    // UTF-32 LE's mark starts with UTF-16 LE's, so it is checked first.
    if sample == BOM_UTF32_LE {
        return (Utf::Utf32Le, 4);
    }
    if sample == BOM_UTF32_BE {
        return (Utf::Utf32Be, 4);
    }
    if sample.starts_with(BOM_UTF8) {
        return (Utf::Utf8, 3);
    }
    if sample.starts_with(BOM_UTF16_LE) {
        return (Utf::Utf16Le, 2);
    }
    if sample.starts_with(BOM_UTF16_BE) {
        return (Utf::Utf16Be, 2);
    }

    if sample.len() == 4 {
        let nulls: Vec<bool> = sample.iter().map(|b| *b == 0).collect();
        match nulls.as_slice() {
            [true, false, true, false] => return (Utf::Utf16Be, 0),
            [false, true, false, true] => return (Utf::Utf16Le, 0),
            [true, true, true, false] => return (Utf::Utf32Be, 0),
            [false, true, true, true] => return (Utf::Utf32Le, 0),
            _ => {}
        }
    }
    (Utf::Utf8, 0)
}

/// Decode `data` as text using the sniffed encoding. `None` if the bytes are
/// not valid in that encoding.
pub fn decode_text(data: &[u8]) -> Option<String> {
    let (utf, bom) = sniff(data);
    let data = &data[bom..];
    match utf {
        Utf::Utf8 => std::str::from_utf8(data).ok().map(str::to_string),
        Utf::Utf16Le | Utf::Utf16Be => {
            if data.len() % 2 != 0 {
                return None;
            }
            let units = data.chunks_exact(2).map(|c| {
                let pair = [c[0], c[1]];
                if utf == Utf::Utf16Le {
                    u16::from_le_bytes(pair)
                } else {
                    u16::from_be_bytes(pair)
                }
            });
            char::decode_utf16(units).collect::<Result<String, _>>().ok()
        }
        Utf::Utf32Le | Utf::Utf32Be => {
            if data.len() % 4 != 0 {
                return None;
            }
            data.chunks_exact(4)
                .map(|c| {
                    let quad = [c[0], c[1], c[2], c[3]];
                    let code = if utf == Utf::Utf32Le {
                        u32::from_le_bytes(quad)
                    } else {
                        u32::from_be_bytes(quad)
                    };
                    char::from_u32(code)
                })
                .collect()
        }
    }
}
