//! Amiga period tables and clock constants.
//!
//! Periods are stored multiplied by 16 so finetune steps in the extended
//! octaves keep their resolution. The standard Protracker octaves follow the
//! original values exactly.

use tm_ir::Pitch;

/// PAL Amiga base clock in Hz (28.37516 MHz / 4).
pub const PAL_CLOCK: f64 = 28.375_16e6 / 4.0;

/// NTSC Amiga base clock in Hz (315/22 MHz / 2).
pub const NTSC_CLOCK: f64 = 315.0 / 22.0 * 1e6 / 2.0;

/// Scale of internal periods relative to Amiga periods.
pub const PERIOD_SCALE: i32 = 16;

/// Entries per finetune row.
pub const PERIODS_PER_FINETUNE: usize = 84;

/// Index of C-2 (Amiga period 428) within a finetune row.
pub const NOTE_BASE: usize = 36;

/// Lowest period reachable by portamento up (Amiga 113, B-3).
pub const PERIOD_MIN: i32 = 113 * PERIOD_SCALE;

/// Highest period reachable by portamento down (Amiga 856, C-1).
pub const PERIOD_MAX: i32 = 856 * PERIOD_SCALE;

/// Protracker sine multipliers for vibrato and tremolo.
#[rustfmt::skip]
pub const VIBRATO_SINE: [u8; 32] = [
      0,  24,  49,  74,  97, 120, 141, 161,
    180, 197, 212, 224, 235, 244, 250, 253,
    255, 253, 250, 244, 235, 224, 212, 197,
    180, 161, 141, 120,  97,  74,  49,  24,
];

/// One row per finetune step from -8 to 7, each spanning three octaves
/// either side of C-2, strictly decreasing.
#[rustfmt::skip]
pub static PERIOD_TABLE: [[u16; PERIODS_PER_FINETUNE]; 16] = [
    // Finetune -8
    [
        58048, 54784, 51712, 48768, 46080, 43392, 40960, 38656, 36480, 34432, 32512, 30720,
        29024, 27392, 25856, 24384, 23040, 21696, 20480, 19328, 18240, 17216, 16256, 15360,
        14512, 13696, 12928, 12192, 11520, 10848, 10240, 9664, 9120, 8608, 8128, 7680,
        7248, 6848, 6464, 6096, 5760, 5424, 5120, 4832, 4560, 4304, 4064, 3840,
        3616, 3424, 3232, 3040, 2880, 2720, 2560, 2416, 2288, 2160, 2032, 1920,
        1808, 1712, 1616, 1520, 1440, 1360, 1280, 1208, 1144, 1080, 1016, 960,
        904, 856, 808, 760, 720, 680, 640, 604, 572, 540, 508, 480,
    ],
    // Finetune -7
    [
        57600, 54400, 51328, 48448, 45760, 43200, 40704, 38464, 36288, 34240, 32320, 30528,
        28800, 27200, 25664, 24224, 22880, 21600, 20352, 19232, 18144, 17120, 16160, 15264,
        14400, 13600, 12832, 12112, 11440, 10800, 10176, 9616, 9072, 8560, 8080, 7632,
        7200, 6800, 6416, 6064, 5712, 5392, 5088, 4800, 4544, 4288, 4048, 3808,
        3600, 3392, 3200, 3024, 2864, 2704, 2544, 2400, 2272, 2144, 2016, 1904,
        1800, 1696, 1600, 1512, 1432, 1352, 1272, 1200, 1136, 1072, 1008, 952,
        900, 848, 800, 756, 716, 676, 636, 600, 568, 536, 504, 476,
    ],
    // Finetune -6
    [
        57216, 54016, 50944, 48128, 45376, 42880, 40448, 38208, 36032, 34048, 32128, 30336,
        28608, 27008, 25472, 24064, 22688, 21440, 20224, 19104, 18016, 17024, 16064, 15168,
        14304, 13504, 12736, 12032, 11344, 10720, 10112, 9552, 9008, 8512, 8032, 7584,
        7152, 6752, 6368, 6016, 5680, 5360, 5056, 4768, 4512, 4256, 4016, 3792,
        3568, 3376, 3184, 3008, 2832, 2672, 2528, 2384, 2256, 2128, 2000, 1888,
        1784, 1688, 1592, 1504, 1416, 1336, 1264, 1192, 1128, 1064, 1000, 944,
        892, 844, 796, 752, 708, 668, 632, 596, 564, 532, 500, 472,
    ],
    // Finetune -5
    [
        56768, 53632, 50624, 47744, 45056, 42560, 40192, 37888, 35776, 33792, 31872, 30080,
        28384, 26816, 25312, 23872, 22528, 21280, 20096, 18944, 17888, 16896, 15936, 15040,
        14192, 13408, 12656, 11936, 11264, 10640, 10048, 9472, 8944, 8448, 7968, 7520,
        7104, 6704, 6320, 5968, 5632, 5312, 5024, 4736, 4480, 4224, 3984, 3760,
        3552, 3344, 3168, 2992, 2816, 2656, 2512, 2368, 2240, 2112, 2000, 1888,
        1776, 1672, 1584, 1496, 1408, 1328, 1256, 1184, 1120, 1056, 1000, 944,
        888, 836, 792, 748, 704, 664, 628, 592, 560, 528, 500, 472,
    ],
    // Finetune -4
    [
        56384, 53248, 50240, 47424, 44736, 42240, 39872, 37632, 35520, 33536, 31616, 29888,
        28192, 26624, 25120, 23712, 22368, 21120, 19936, 18816, 17760, 16768, 15808, 14944,
        14096, 13312, 12560, 11856, 11184, 10560, 9968, 9408, 8880, 8384, 7904, 7472,
        7056, 6656, 6272, 5920, 5600, 5280, 4992, 4704, 4448, 4192, 3952, 3728,
        3520, 3328, 3136, 2960, 2800, 2640, 2496, 2352, 2224, 2096, 1968, 1872,
        1760, 1664, 1568, 1480, 1400, 1320, 1248, 1176, 1112, 1048, 984, 936,
        880, 832, 784, 740, 700, 660, 624, 588, 556, 524, 492, 468,
    ],
    // Finetune -3
    [
        56000, 52864, 49856, 47104, 44416, 41920, 39616, 37376, 35264, 33280, 31424, 29632,
        28000, 26432, 24928, 23552, 22208, 20960, 19808, 18688, 17632, 16640, 15712, 14816,
        14000, 13216, 12464, 11776, 11104, 10480, 9904, 9344, 8816, 8320, 7856, 7408,
        6992, 6608, 6240, 5888, 5552, 5248, 4944, 4672, 4416, 4160, 3920, 3712,
        3504, 3296, 3120, 2944, 2784, 2624, 2480, 2336, 2208, 2080, 1968, 1856,
        1752, 1648, 1560, 1472, 1392, 1312, 1240, 1168, 1104, 1040, 984, 928,
        876, 824, 780, 736, 696, 656, 620, 584, 552, 520, 492, 464,
    ],
    // Finetune -2
    [
        55552, 52480, 49536, 46720, 44096, 41664, 39296, 37120, 35008, 33024, 31168, 29440,
        27776, 26240, 24768, 23360, 22048, 20832, 19648, 18560, 17504, 16512, 15584, 14720,
        13888, 13120, 12384, 11680, 11024, 10416, 9824, 9280, 8752, 8256, 7792, 7360,
        6944, 6560, 6192, 5840, 5520, 5200, 4912, 4640, 4384, 4128, 3904, 3680,
        3472, 3280, 3088, 2928, 2752, 2608, 2464, 2320, 2192, 2064, 1952, 1840,
        1736, 1640, 1544, 1464, 1376, 1304, 1232, 1160, 1096, 1032, 976, 920,
        868, 820, 772, 732, 688, 652, 616, 580, 548, 516, 488, 460,
    ],
    // Finetune -1
    [
        55168, 52096, 49152, 46400, 43776, 41344, 39040, 36800, 34752, 32832, 30976, 29248,
        27584, 26048, 24576, 23200, 21888, 20672, 19520, 18400, 17376, 16416, 15488, 14624,
        13792, 13024, 12288, 11600, 10944, 10336, 9760, 9200, 8688, 8208, 7744, 7312,
        6896, 6512, 6144, 5808, 5472, 5168, 4880, 4608, 4352, 4096, 3872, 3648,
        3456, 3248, 3072, 2896, 2736, 2576, 2432, 2304, 2176, 2048, 1936, 1824,
        1728, 1624, 1536, 1448, 1368, 1288, 1216, 1152, 1088, 1024, 968, 912,
        864, 812, 768, 724, 684, 644, 608, 576, 544, 512, 484, 456,
    ],
    // Finetune 0
    [
        54784, 51712, 48768, 46080, 43392, 40960, 38656, 36480, 34432, 32512, 30720, 28992,
        27392, 25856, 24384, 23040, 21696, 20480, 19328, 18240, 17216, 16256, 15360, 14496,
        13696, 12928, 12192, 11520, 10848, 10240, 9664, 9120, 8608, 8128, 7680, 7248,
        6848, 6464, 6096, 5760, 5424, 5120, 4832, 4560, 4304, 4064, 3840, 3616,
        3424, 3232, 3040, 2880, 2720, 2560, 2416, 2288, 2160, 2032, 1920, 1808,
        1712, 1616, 1520, 1440, 1360, 1280, 1208, 1144, 1080, 1016, 960, 904,
        856, 808, 760, 720, 680, 640, 604, 572, 540, 508, 480, 452,
    ],
    // Finetune 1
    [
        54400, 51328, 48448, 45760, 43136, 40768, 38464, 36288, 34240, 32320, 30528, 28800,
        27200, 25664, 24224, 22880, 21568, 20384, 19232, 18144, 17120, 16160, 15264, 14400,
        13600, 12832, 12112, 11440, 10784, 10192, 9616, 9072, 8560, 8080, 7632, 7200,
        6800, 6416, 6064, 5712, 5392, 5088, 4800, 4544, 4288, 4048, 3824, 3600,
        3408, 3216, 3024, 2864, 2704, 2544, 2400, 2272, 2144, 2016, 1904, 1808,
        1704, 1608, 1512, 1432, 1352, 1272, 1200, 1136, 1072, 1008, 952, 904,
        852, 804, 756, 716, 676, 636, 600, 568, 536, 504, 476, 452,
    ],
    // Finetune 2
    [
        54016, 50944, 48128, 45376, 42880, 40448, 38208, 36032, 34048, 32128, 30336, 28608,
        27008, 25472, 24064, 22688, 21440, 20224, 19104, 18016, 17024, 16064, 15168, 14304,
        13504, 12736, 12032, 11344, 10720, 10112, 9552, 9008, 8512, 8032, 7584, 7152,
        6752, 6368, 6016, 5680, 5360, 5056, 4768, 4512, 4256, 4016, 3792, 3584,
        3376, 3184, 3008, 2832, 2672, 2528, 2384, 2256, 2128, 2000, 1888, 1792,
        1688, 1592, 1504, 1416, 1336, 1264, 1192, 1128, 1064, 1000, 944, 896,
        844, 796, 752, 708, 668, 632, 596, 564, 532, 500, 472, 448,
    ],
    // Finetune 3
    [
        53632, 50624, 47744, 45056, 42560, 40192, 37888, 35776, 33792, 31872, 30080, 28416,
        26816, 25312, 23872, 22528, 21280, 20096, 18944, 17888, 16896, 15936, 15040, 14208,
        13408, 12656, 11936, 11264, 10640, 10048, 9472, 8944, 8448, 7968, 7520, 7104,
        6704, 6320, 5968, 5632, 5312, 5024, 4736, 4480, 4224, 3984, 3760, 3552,
        3344, 3168, 2992, 2816, 2656, 2512, 2368, 2240, 2112, 2000, 1888, 1776,
        1672, 1584, 1496, 1408, 1328, 1256, 1184, 1120, 1056, 1000, 944, 888,
        836, 792, 748, 704, 664, 628, 592, 560, 528, 500, 472, 444,
    ],
    // Finetune 4
    [
        53248, 50240, 47424, 44736, 42240, 39872, 37632, 35520, 33536, 31680, 29888, 28224,
        26624, 25120, 23712, 22368, 21120, 19936, 18816, 17760, 16768, 15840, 14944, 14112,
        13312, 12560, 11856, 11184, 10560, 9968, 9408, 8880, 8384, 7920, 7472, 7056,
        6656, 6272, 5920, 5600, 5280, 4992, 4704, 4448, 4192, 3952, 3728, 3520,
        3328, 3136, 2960, 2800, 2640, 2496, 2352, 2224, 2096, 1984, 1872, 1760,
        1664, 1568, 1480, 1400, 1320, 1248, 1176, 1112, 1048, 992, 936, 880,
        832, 784, 740, 700, 660, 624, 588, 556, 524, 496, 468, 440,
    ],
    // Finetune 5
    [
        52864, 49856, 47104, 44416, 41920, 39616, 37376, 35264, 33280, 31424, 29632, 27968,
        26432, 24928, 23552, 22208, 20960, 19808, 18688, 17632, 16640, 15712, 14816, 13984,
        13216, 12464, 11776, 11104, 10480, 9904, 9344, 8816, 8320, 7856, 7408, 6992,
        6608, 6240, 5888, 5552, 5248, 4944, 4672, 4416, 4160, 3920, 3712, 3504,
        3296, 3120, 2944, 2784, 2624, 2480, 2336, 2208, 2080, 1968, 1856, 1744,
        1648, 1560, 1472, 1392, 1312, 1240, 1168, 1104, 1040, 984, 928, 872,
        824, 780, 736, 696, 656, 620, 584, 552, 520, 492, 464, 436,
    ],
    // Finetune 6
    [
        52480, 49536, 46720, 44096, 41664, 39296, 37120, 35008, 33024, 31168, 29440, 27776,
        26240, 24768, 23360, 22048, 20832, 19648, 18560, 17504, 16512, 15584, 14720, 13888,
        13120, 12384, 11680, 11024, 10416, 9824, 9280, 8752, 8256, 7792, 7360, 6944,
        6560, 6192, 5840, 5520, 5200, 4912, 4640, 4384, 4128, 3904, 3680, 3472,
        3280, 3088, 2928, 2752, 2608, 2464, 2320, 2192, 2064, 1952, 1840, 1744,
        1640, 1544, 1464, 1376, 1304, 1232, 1160, 1096, 1032, 976, 920, 872,
        820, 772, 732, 688, 652, 616, 580, 548, 516, 488, 460, 436,
    ],
    // Finetune 7
    [
        52096, 49152, 46400, 43776, 41344, 39040, 36800, 34752, 32832, 30976, 29248, 27584,
        26048, 24576, 23200, 21888, 20672, 19520, 18400, 17376, 16416, 15488, 14624, 13792,
        13024, 12288, 11600, 10944, 10336, 9760, 9200, 8688, 8208, 7744, 7312, 6896,
        6512, 6144, 5808, 5472, 5168, 4880, 4608, 4352, 4096, 3872, 3648, 3456,
        3264, 3072, 2896, 2736, 2576, 2432, 2304, 2176, 2048, 1936, 1824, 1728,
        1632, 1536, 1448, 1368, 1288, 1216, 1152, 1088, 1024, 968, 912, 864,
        816, 768, 724, 684, 644, 608, 576, 544, 512, 484, 456, 432,
    ],
];

fn finetune_row(finetune: i8) -> &'static [u16; PERIODS_PER_FINETUNE] {
    &PERIOD_TABLE[(finetune.clamp(-8, 7) + 8) as usize]
}

/// Internal period for a pitch at a finetune.
///
/// Semitone is clamped to 0-11, octave to -3..=3 and finetune to -8..=7.
pub fn note_period(pitch: Pitch, finetune: i8) -> i32 {
    let index = NOTE_BASE as i32
        + pitch.semitone.min(11) as i32
        + pitch.octave.clamp(-3, 3) as i32 * 12;
    finetune_row(finetune)[index as usize] as i32
}

/// Round a period to the first semitone at or below it (glissando).
///
/// Periods below the table's range yield its last entry.
pub fn floor_period(period: i32, finetune: i8) -> i32 {
    let row = finetune_row(finetune);
    let entry = row
        .iter()
        .find(|&&p| p as i32 <= period)
        .unwrap_or(&row[PERIODS_PER_FINETUNE - 1]);
    *entry as i32
}
