#![no_main]

use libfuzzer_sys::fuzz_target;
use spark_rbb_log::LogRecord;

// 任意字节都只能解码成功或返回帧错误；成功时各段长度必须落在输入之内。
fuzz_target!(|data: &[u8]| {
    if let Ok(record) = LogRecord::decode(data) {
        assert!(record.encoded_len() <= data.len());
    }
});
