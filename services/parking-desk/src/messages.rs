//! Operator-facing texts

pub const NO_IMAGE: &str = "無圖片";
pub const PLATE_IMAGE_ALT: &str = "車輛圖片";
pub const NOT_EXITED: &str = "尚未離場";
pub const FEE_NOT_COMPUTED: &str = "尚未計算";
pub const NO_RECORDS: &str = "無車輛紀錄";
pub const NO_SPACES: &str = "無車位資料";

pub const OCCUPIED: &str = "已佔用";
pub const VACANT: &str = "空位";
pub const CHARGING: &str = "充電中";
pub const NOT_CHARGING: &str = "未充電";
pub const NONE: &str = "-";

pub const EXIT_ACTION: &str = "離場";
pub const DELETE_ACTION: &str = "刪除";
pub const TOGGLE_OCCUPIED_ACTION: &str = "切換佔用";
pub const TOGGLE_CHARGING_ACTION: &str = "切換充電";

pub const PLATE_REQUIRED: &str = "請輸入車牌號碼！";
pub const INVALID_RECORD_ID: &str = "無效的記錄 ID！";
pub const INVALID_SPACE_ID: &str = "無效的車位 ID！";
pub const CONFIRM_DELETE: &str = "確定要刪除這筆記錄嗎？";
pub const DELETE_CANCELLED: &str = "已取消刪除";

pub const ENTRY_FAILED: &str = "進場失敗，請稍後再試！";
pub const EXIT_FAILED: &str = "離場失敗，請稍後再試！";
pub const EXIT_NO_RECORD: &str = "無法獲取車輛資料或費用";
pub const UNKNOWN_ERROR: &str = "未知錯誤";
pub const LOAD_RECORDS_FAILED: &str = "無法載入紀錄，請稍後再試！";
pub const LOAD_SPACES_FAILED: &str = "無法載入車位，請稍後再試！";
pub const FEE_NOT_FOUND: &str = "查無該車輛記錄或車輛已離場！";
pub const RECORD_NOT_FOUND: &str = "查無該車輛的進場紀錄！";
pub const SPACE_UPDATE_FAILED: &str = "車位更新失敗，請稍後再試！";
pub const DONE: &str = "操作成功";

pub fn exit_fee(fee: Option<f64>) -> String {
    format!("車輛已離場，停車費用：{} 元", fee_text(fee))
}

pub fn delete_failed(reason: Option<&str>) -> String {
    format!("刪除失敗：{}", reason.unwrap_or(UNKNOWN_ERROR))
}

pub fn fee_estimate(plate: &str, fee: f64) -> String {
    format!("車牌 {} 停車費用預估：{} 元", plate, fee)
}

pub fn recognized_plate(plate: &str) -> String {
    format!("辨識車牌：{}", plate)
}

pub fn found_record(plate: &str, record_id: u64) -> String {
    format!("車牌 {} 的紀錄編號：{}", plate, record_id)
}

/// Fee as shown to the operator, or the not-computed placeholder
pub fn fee_text(fee: Option<f64>) -> String {
    fee.map(|f| f.to_string())
        .unwrap_or_else(|| FEE_NOT_COMPUTED.to_string())
}
