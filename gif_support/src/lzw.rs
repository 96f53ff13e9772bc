use std::collections::HashMap;

use bit_vec::BitVec;
use custom_error::custom_error;

pub const MAX_CODE_SIZE: u8 = 12;
// roots are palette indices
pub const MAX_MIN_CODE_SIZE: u8 = 8;
const MAX_DICTIONARY_SIZE: usize = 1 << MAX_CODE_SIZE;

custom_error! {pub LZWError
    InvalidCodeSize {code_size: u8} = "Invalid LZW minimum code size: {code_size}",
    InvalidCode {code: usize, dictionary_size: usize} = "Unexpected code {code} for dictionary of {dictionary_size} entries",
    InvalidIndex {index: u8, min_code_size: u8} = "Index {index} does not fit into minimum code size {min_code_size}"
}

pub fn check_min_code_size(min_code_size: u8) -> Result<(), LZWError> {
    if min_code_size == 0 || min_code_size > MAX_MIN_CODE_SIZE {
        return Err(LZWError::InvalidCodeSize {
            code_size: min_code_size,
        });
    }

    Ok(())
}

/// Decodes GIF image data (sub-blocks already joined) into palette indices.
///
/// Stops at the end code, or when the data runs out if the end code is missing.
pub fn decode(data: &[u8], min_code_size: u8) -> Result<Vec<u8>, LZWError> {
    check_min_code_size(min_code_size)?;

    let bits = bit_vec_for_source_bytes(data);

    let mut indices: Vec<u8> = Vec::new();
    let mut dictionary: Vec<Vec<u8>> = Vec::new(); // index is a key
    let (clear_code, end_code) = init_dictionary(&mut dictionary, min_code_size);
    let mut code_size = min_code_size + 1;
    let mut offset = 0;
    let mut prev_code: Option<usize> = None;

    while offset + code_size as usize <= bits.len() {
        let code = read_bits(&bits, offset, code_size) as usize;
        offset += code_size as usize;

        if code == clear_code {
            init_dictionary(&mut dictionary, min_code_size);
            code_size = min_code_size + 1;
            prev_code = None;
            continue;
        }

        if code == end_code {
            break;
        }

        let entry = match prev_code {
            _ if code < dictionary.len() => dictionary[code].clone(),
            Some(prev_code) if code == dictionary.len() => {
                // match to an entry that is being defined by this very code
                let mut entry = dictionary[prev_code].clone();
                entry.push(entry[0]);
                entry
            },
            _ => return Err(LZWError::InvalidCode {
                code,
                dictionary_size: dictionary.len(),
            }),
        };

        if let Some(prev_code) = prev_code {
            if dictionary.len() < MAX_DICTIONARY_SIZE {
                let mut new_entry = dictionary[prev_code].clone();
                new_entry.push(entry[0]);
                dictionary.push(new_entry);
            }
        }

        indices.extend_from_slice(&entry);
        prev_code = Some(code);

        if should_increase_code_size(dictionary.len(), code_size) {
            code_size += 1;
        }
    }

    Ok(indices)
}

/// Encodes palette indices into GIF image data (without the sub-block framing).
pub fn encode(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>, LZWError> {
    check_min_code_size(min_code_size)?;

    let root_codes = 1usize << min_code_size;
    let clear_code = root_codes;
    let end_code = root_codes + 1;

    let mut bits = BitVec::new();
    let mut dictionary: HashMap<(usize, u8), usize> = HashMap::new(); // (prefix code, next index) -> code
    let mut next_code = end_code + 1;
    let mut code_size = min_code_size + 1;
    let mut prefix: Option<usize> = None;

    // add clear code first
    append_bits(&mut bits, clear_code as u16, code_size);

    for &index in indices {
        if index as usize >= root_codes {
            return Err(LZWError::InvalidIndex {
                index,
                min_code_size,
            });
        }

        let current = match prefix {
            Some(v) => v,
            None => {
                prefix = Some(index as usize);
                continue;
            }
        };

        if let Some(&code) = dictionary.get(&(current, index)) {
            prefix = Some(code);
            continue;
        }

        append_bits(&mut bits, current as u16, code_size);

        if next_code < MAX_DICTIONARY_SIZE {
            dictionary.insert((current, index), next_code);
            next_code += 1;

            // decoder lags one entry behind, so it switches when next_code passes the limit
            if next_code > (1 << code_size) && code_size < MAX_CODE_SIZE {
                code_size += 1;
            }
        } else {
            append_bits(&mut bits, clear_code as u16, code_size);
            dictionary.clear();
            next_code = end_code + 1;
            code_size = min_code_size + 1;
        }

        prefix = Some(index as usize);
    }

    if let Some(current) = prefix {
        append_bits(&mut bits, current as u16, code_size);

        // the decoder adds one more entry after reading the last code
        if next_code >= (1 << code_size) && code_size < MAX_CODE_SIZE {
            code_size += 1;
        }
    }

    append_bits(&mut bits, end_code as u16, code_size);

    Ok(bits.to_bytes().iter()
        .map(|v| mirror_bits(*v))
        .collect())
}

fn init_dictionary(dictionary: &mut Vec<Vec<u8>>, min_code_size: u8) -> (usize, usize) {
    dictionary.clear();

    for i in 0..(1usize << min_code_size) {
        dictionary.push(vec![i as u8]);
    }

    let clear_code = dictionary.len();
    dictionary.push(Vec::new());

    let end_code = dictionary.len();
    dictionary.push(Vec::new());

    (clear_code, end_code)
}

fn should_increase_code_size(dictionary_size: usize, code_size: u8) -> bool {
    dictionary_size == 1 << code_size && code_size < MAX_CODE_SIZE
}

fn read_bits(bits: &BitVec, offset: usize, total: u8) -> u16 {
    let mut result = 0;

    for i in 0..total {
        result = result << 1;
        let bit = if bits[offset + (total as usize - 1 - i as usize)] { 1 } else { 0 };
        result = result | bit;
    }

    result
}

fn bit_vec_for_source_bytes(data: &[u8]) -> BitVec {
    BitVec::from_fn(data.len() * 8, |x| (data[x / 8] >> (x % 8)) & 0b1 == 1)
}

fn append_bits(bits: &mut BitVec, code: u16, code_size: u8) {
    for i in 0..code_size {
        bits.push(((code >> i) & 0b1) == 1);
    }
}

// 0b10000000 -> 0b00000001
fn mirror_bits(v: u8) -> u8 {
    let mut v = v;
    let mut result = 0;

    for _ in 0..8 {
        result = (result << 1) | (v & 0b1);
        v = v >> 1;
    }

    result
}
