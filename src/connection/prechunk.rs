// Payload pre-serialization into chunk-sized fragments

use crate::pages::{PageList, PagePool};
use crate::rtmp::PrechunkContext;

/// Appends a payload to a page list, split into chunks of the given size
///
/// A single-byte Type 3 continuation header is inserted before every
/// fragment except the very first one of the message, so the resulting
/// pages can be handed to the transport without re-chunking and reused for
/// any number of subscribers.
///
/// # Arguments
///
/// * `prechunk_ctx` - Chunk offset tracker. Must be fresh for each message
/// * `mem` - Payload bytes to append
/// * `page_pool` - Pool allocating the pages
/// * `page_list` - List receiving the fragments
/// * `chunk_stream_id` - Chunk stream the continuation headers refer to
/// * `first_chunk` - True when mem starts at the beginning of the message
/// * `prechunk_size` - Chunk size to split with
pub fn fill_prechunked_pages(
    prechunk_ctx: &mut PrechunkContext,
    mem: &[u8],
    page_pool: &PagePool,
    page_list: &mut PageList,
    chunk_stream_id: u32,
    first_chunk: bool,
    prechunk_size: u32,
) {
    // Continuation headers are single byte, which limits the ids
    debug_assert!(chunk_stream_id > 1 && chunk_stream_id < 64);

    let mut total_filled: usize = 0;

    while total_filled < mem.len() {
        if prechunk_ctx.prechunk_offset == 0 && !(first_chunk && total_filled == 0) {
            let header_byte = 0xc0 | (chunk_stream_id as u8 & 0x3f);

            page_pool.fill_pages(page_list, &[header_byte]);
        }

        let left_in_chunk = (prechunk_size - prechunk_ctx.prechunk_offset) as usize;
        let tofill = left_in_chunk.min(mem.len() - total_filled);

        page_pool.fill_pages(page_list, &mem[total_filled..total_filled + tofill]);

        total_filled += tofill;

        prechunk_ctx.prechunk_offset += tofill as u32;
        if prechunk_ctx.prechunk_offset == prechunk_size {
            prechunk_ctx.prechunk_offset = 0;
        }
    }
}

// Tests
