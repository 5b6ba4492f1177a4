// ==========================================
// 纺纱生产执行系统 - 历法边界
// ==========================================
// 职责: 批次编号日期段的波斯历 (Solar Hijri) 换算
// 约束: 全系统唯一的非公历换算点; 核心内部一律使用公历 NaiveDate/NaiveDateTime
// 说明: 现场操作工以波斯历读日期, 批次号日期段按波斯历 YYMMDD 渲染,
//       例如 CR-040929-001 = 1404年9月29日的第1个梳棉批次
// ==========================================

use chrono::{Datelike, NaiveDate};

// 公历每月天数 (平年)
const G_DAYS_IN_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

// 波斯历每月天数 (平年, 闰年12月为30天)
const J_DAYS_IN_MONTH: [i64; 12] = [31, 31, 31, 31, 31, 31, 30, 30, 30, 30, 30, 29];

/// 公历闰年判断
fn is_gregorian_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// 公历日期 → 波斯历 (年, 月, 日)
///
/// 采用 33 年周期民用算法 (与现场原有编号数据一致)
pub fn jalali_from_gregorian(date: NaiveDate) -> (i32, u32, u32) {
    let gy = i64::from(date.year()) - 1600;
    let gm = date.month0() as i64;
    let gd = i64::from(date.day0());

    // 1600-03-01 基准的公历序数
    let mut g_day_no = 365 * gy + (gy + 3) / 4 - (gy + 99) / 100 + (gy + 399) / 400;
    for len in G_DAYS_IN_MONTH.iter().take(gm as usize) {
        g_day_no += len;
    }
    if gm > 1 && is_gregorian_leap(date.year()) {
        g_day_no += 1;
    }
    g_day_no += gd;

    // 979-01-01 波斯历对齐偏移
    let mut j_day_no = g_day_no - 79;

    // 12053 = 33年周期总天数, 1461 = 4年周期总天数
    let j_np = j_day_no / 12053;
    j_day_no %= 12053;

    let mut jy = 979 + 33 * j_np + 4 * (j_day_no / 1461);
    j_day_no %= 1461;

    if j_day_no >= 366 {
        jy += (j_day_no - 1) / 365;
        j_day_no = (j_day_no - 1) % 365;
    }

    let mut jm = 0usize;
    while jm < 11 && j_day_no >= J_DAYS_IN_MONTH[jm] {
        j_day_no -= J_DAYS_IN_MONTH[jm];
        jm += 1;
    }

    (jy as i32, (jm + 1) as u32, (j_day_no + 1) as u32)
}

/// 波斯历短日期段: YYMMDD (无世纪)
///
/// 批次编号的日期段使用此格式, 例如 1404-09-29 → "040929"
pub fn bucket_short(date: NaiveDate) -> String {
    let (jy, jm, jd) = jalali_from_gregorian(date);
    format!("{:02}{:02}{:02}", jy % 100, jm, jd)
}

/// 波斯历完整日期段: YYYYMMDD (含世纪) — 用于展示
pub fn bucket_full(date: NaiveDate) -> String {
    let (jy, jm, jd) = jalali_from_gregorian(date);
    format!("{}{:02}{:02}", jy, jm, jd)
}

/// 波斯历展示格式: 1404/09/29
pub fn display(date: NaiveDate) -> String {
    let (jy, jm, jd) = jalali_from_gregorian(date);
    format!("{}/{:02}/{:02}", jy, jm, jd)
}

/// 今日波斯历短日期段 (本地时区)
pub fn today_bucket_short() -> String {
    bucket_short(chrono::Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nowruz_boundaries() {
        // 1403/1404/1405 年波斯历元旦
        assert_eq!(jalali_from_gregorian(g(2024, 3, 20)), (1403, 1, 1));
        assert_eq!(jalali_from_gregorian(g(2025, 3, 21)), (1404, 1, 1));
        assert_eq!(jalali_from_gregorian(g(2026, 3, 21)), (1405, 1, 1));
    }

    #[test]
    fn test_known_dates() {
        // 现场编号示例: CR-040929 = 1404年9月29日
        assert_eq!(jalali_from_gregorian(g(2025, 12, 20)), (1404, 9, 29));
        // 元旦前一日 (1403 为闰年, 12月有30天)
        assert_eq!(jalali_from_gregorian(g(2025, 3, 20)), (1403, 12, 30));
    }

    #[test]
    fn test_bucket_formats() {
        let d = g(2025, 12, 20);
        assert_eq!(bucket_short(d), "040929");
        assert_eq!(bucket_full(d), "14040929");
        assert_eq!(display(d), "1404/09/29");
    }

    #[test]
    fn test_bucket_changes_with_day() {
        // 相邻公历日产生不同日期段 (日期段决定计数器分桶)
        assert_ne!(bucket_short(g(2026, 8, 6)), bucket_short(g(2026, 8, 7)));
    }
}
